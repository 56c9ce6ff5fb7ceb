//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fire_gateway::{
    ChannelEvent, ClassificationOutcome, Classifier, Features, InboundMessage, IngestState, IngestStats,
    MessageSource, RecordSink, SensorLogRecord, SinkError,
};

pub const TOPIC: &str = "building/lab/node_01/telemetry";

pub fn message(payload: &str) -> ChannelEvent {
    ChannelEvent::Message(InboundMessage {
        topic: TOPIC.to_string(),
        payload: payload.as_bytes().to_vec(),
    })
}

// ---

/// Classifier returning a fixed verdict and remembering what it was asked.
pub struct FakeClassifier {
    is_alarm: bool,
    p_fire: f64,
    pub seen: Mutex<Vec<Features>>,
}

impl FakeClassifier {
    pub fn new(is_alarm: bool, p_fire: f64) -> Arc<Self> {
        Arc::new(Self {
            is_alarm,
            p_fire,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<Features> {
        self.seen.lock().unwrap().clone()
    }
}

impl Classifier for FakeClassifier {
    fn predict(&self, features: &Features) -> bool {
        self.seen.lock().unwrap().push(*features);
        self.is_alarm
    }

    fn predict_probability(&self, _features: &Features) -> [f64; 2] {
        [1.0 - self.p_fire, self.p_fire]
    }
}

pub fn safe_outcome() -> ClassificationOutcome {
    ClassificationOutcome {
        is_alarm: false,
        fire_risk_percent: 2.0,
    }
}

// ---

/// Sink that keeps every appended record. Optionally fails the first
/// `fail_first` calls, or stalls each call for `stall`.
#[derive(Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<SensorLogRecord>>>,
    attempts: Arc<Mutex<usize>>,
    fail_first: usize,
    stall: Option<Duration>,
}

impl RecordingSink {
    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_first: n,
            ..Self::default()
        }
    }

    pub fn stalling(stall: Duration) -> Self {
        Self {
            stall: Some(stall),
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<SensorLogRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl RecordSink for RecordingSink {
    async fn append(&self, record: &SensorLogRecord) -> Result<(), SinkError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts += 1;
            *attempts
        };

        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        if attempt <= self.fail_first {
            return Err(SinkError::Rejected("connection refused".to_string()));
        }

        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ---

/// Message source replaying a fixed script, then closing.
pub struct ScriptedSource {
    events: VecDeque<ChannelEvent>,
    stats: Option<Arc<IngestStats>>,
    /// Loop state observed each time the loop asked for the next event.
    pub observed: Vec<IngestState>,
}

impl ScriptedSource {
    pub fn new(events: Vec<ChannelEvent>) -> Self {
        Self {
            events: events.into(),
            stats: None,
            observed: Vec::new(),
        }
    }

    pub fn observing(mut self, stats: Arc<IngestStats>) -> Self {
        self.stats = Some(stats);
        self
    }
}

impl MessageSource for ScriptedSource {
    async fn next_event(&mut self) -> Option<ChannelEvent> {
        if let Some(stats) = &self.stats {
            self.observed.push(stats.state());
        }
        self.events.pop_front()
    }
}
