mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use common::{message, FakeClassifier, RecordingSink, ScriptedSource};
use fire_gateway::{
    CalibrationRange, ChannelEvent, Classifier, IngestError, IngestState, Ingestor, RandomForest, RiskPolicy,
    RiskStatus, SinkError,
};

fn ingestor<C: Classifier>(classifier: Arc<C>, sink: RecordingSink) -> Ingestor<C, RecordingSink> {
    Ingestor::new(CalibrationRange::gas(), classifier, RiskPolicy::default(), sink)
}

#[tokio::test]
async fn calibrated_features_reach_classifier() {
    // ---
    let classifier = FakeClassifier::new(false, 0.02);
    let sink = RecordingSink::default();
    let ingestor = ingestor(classifier.clone(), sink.clone());

    let processed = assert_ok!(
        ingestor
            .handle_payload(br#"{"node_id":"n1","raw_gas":2048,"temp":25,"humidity":40}"#)
            .await
    );

    let seen = classifier.seen();
    assert_eq!(seen.len(), 1);
    let [temp, humidity, gas] = seen[0];
    assert_eq!(temp, 25.0);
    assert_eq!(humidity, 40.0);
    assert!((gas - 500.06).abs() < 0.1, "calibrated gas {gas}");

    assert_eq!(processed.status, RiskStatus::Safe);
    assert_eq!(processed.record.node_id, "n1");
    assert_eq!(processed.record.gas_ppm, gas);
    assert!((processed.record.fire_risk_percent - 2.0).abs() < 1e-9);
    assert_eq!(sink.records(), vec![processed.record]);
}

#[tokio::test]
async fn empty_message_runs_full_pipeline_with_defaults() {
    // ---
    let classifier = FakeClassifier::new(false, 0.0);
    let sink = RecordingSink::default();
    let ingestor = ingestor(classifier.clone(), sink.clone());

    let processed = assert_ok!(ingestor.handle_payload(b"{}").await);
    assert_ok!(processed.persistence);

    assert_eq!(classifier.seen(), vec![[0.0, 50.0, 0.0]]);
    assert_eq!(sink.attempts(), 1);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].node_id, "node_unknown");
    assert_eq!(records[0].temperature, 0.0);
    assert_eq!(records[0].humidity, 50.0);
    assert_eq!(records[0].gas_ppm, 0.0);
    assert_eq!(records[0].status, RiskStatus::Safe);
}

#[tokio::test]
async fn duplicate_messages_are_written_twice() {
    // ---
    let sink = RecordingSink::default();
    let ingestor = ingestor(FakeClassifier::new(false, 0.1), sink.clone());
    let payload = br#"{"node_id":"n7","raw_gas":1000,"temp":30,"humidity":35}"#;

    assert_ok!(ingestor.handle_payload(payload).await);
    assert_ok!(ingestor.handle_payload(payload).await);

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0], records[1]);
    assert_eq!(ingestor.stats().snapshot().persisted, 2);
}

#[tokio::test]
async fn alarm_label_wins_over_low_probability() {
    // ---
    let sink = RecordingSink::default();
    let ingestor = ingestor(FakeClassifier::new(true, 0.05), sink.clone());

    let processed = assert_ok!(ingestor.handle_payload(br#"{"node_id":"n3"}"#).await);

    assert_eq!(processed.status, RiskStatus::Critical);
    assert_eq!(sink.records()[0].status, RiskStatus::Critical);
}

#[tokio::test]
async fn high_probability_without_alarm_is_warning() {
    // ---
    let ingestor = ingestor(FakeClassifier::new(false, 0.51), RecordingSink::default());

    let processed = assert_ok!(ingestor.handle_payload(b"{}").await);
    assert_eq!(processed.status, RiskStatus::Warning);
}

#[tokio::test]
async fn persistence_failure_does_not_block_next_message() {
    // ---
    let sink = RecordingSink::failing_first(1);
    let ingestor = ingestor(FakeClassifier::new(false, 0.3), sink.clone());

    let first = assert_ok!(ingestor.handle_payload(br#"{"node_id":"a"}"#).await);
    assert!(matches!(first.persistence, Err(SinkError::Rejected(_))));
    // Classification and status are unaffected by the failed write
    assert_eq!(first.status, RiskStatus::Safe);

    let second = assert_ok!(ingestor.handle_payload(br#"{"node_id":"b"}"#).await);
    assert_ok!(second.persistence);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].node_id, "b");

    let stats = ingestor.stats().snapshot();
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.persisted, 1);
    assert_eq!(stats.persist_failures, 1);
    assert_eq!(stats.decode_failures, 0);
}

#[tokio::test]
async fn stalled_sink_is_bounded_by_timeout() {
    // ---
    let sink = RecordingSink::stalling(Duration::from_secs(30));
    let ingestor = ingestor(FakeClassifier::new(false, 0.0), sink.clone())
        .with_write_timeout(Duration::from_millis(50));

    let processed = assert_ok!(ingestor.handle_payload(b"{}").await);

    assert!(matches!(processed.persistence, Err(SinkError::Timeout(_))));
    assert!(sink.records().is_empty());
    assert_eq!(ingestor.stats().snapshot().persist_failures, 1);
}

#[tokio::test]
async fn malformed_payload_is_isolated() {
    // ---
    let classifier = FakeClassifier::new(false, 0.0);
    let sink = RecordingSink::default();
    let ingestor = ingestor(classifier.clone(), sink.clone());

    let err = assert_err!(ingestor.handle_payload(b"{\"node_id\": ").await);
    assert!(matches!(err, IngestError::Decode(_)));
    assert!(classifier.seen().is_empty());
    assert_eq!(sink.attempts(), 0);

    assert_ok!(ingestor.handle_payload(br#"{"node_id":"n1","raw_gas":4095}"#).await);
    assert_eq!(sink.records()[0].gas_ppm, 1000.0);
}

#[tokio::test]
async fn loop_survives_bad_messages_and_reconnects() {
    // ---
    let classifier = FakeClassifier::new(false, 0.0);
    let sink = RecordingSink::failing_first(1);
    let ingestor = ingestor(classifier.clone(), sink.clone());

    let mut source = ScriptedSource::new(vec![
        ChannelEvent::Connected,
        message(r#"{"node_id":"n1","temp":21}"#),
        message("this is not json"),
        ChannelEvent::Disconnected,
        ChannelEvent::Disconnected,
        ChannelEvent::Connected,
        message(r#"{"node_id":"n2","temp":22}"#),
        message(r#"{"node_id":"n3","temp":23}"#),
    ])
    .observing(ingestor.stats());

    ingestor.run(&mut source).await;

    assert_eq!(
        source.observed,
        vec![
            IngestState::Disconnected,
            IngestState::Idle,
            IngestState::Idle,
            IngestState::Idle,
            IngestState::Reconnecting,
            IngestState::Reconnecting,
            IngestState::Idle,
            IngestState::Idle,
            IngestState::Idle,
        ]
    );

    // n1's write failed, the malformed message was dropped, n2 and n3 landed
    let nodes: Vec<_> = sink.records().into_iter().map(|r| r.node_id).collect();
    assert_eq!(nodes, vec!["n2", "n3"]);
    assert_eq!(classifier.seen().len(), 3);

    let stats = ingestor.stats().snapshot();
    assert_eq!(stats.ingest_state, IngestState::Disconnected);
    assert_eq!(stats.messages_received, 4);
    assert_eq!(stats.decode_failures, 1);
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.persisted, 2);
    assert_eq!(stats.persist_failures, 1);
}

#[tokio::test]
async fn bundled_artifact_classifies_defaults_and_fire() {
    // ---
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/models/fire_model.json");
    let forest = Arc::new(assert_ok!(RandomForest::load(path)));
    let sink = RecordingSink::default();
    let ingestor = ingestor(forest, sink.clone());

    let quiet = assert_ok!(ingestor.handle_payload(b"{}").await);
    assert_eq!(quiet.status, RiskStatus::Safe);
    assert!(quiet.record.fire_risk_percent < 5.0);

    let fire = assert_ok!(
        ingestor
            .handle_payload(br#"{"node_id":"kitchen","raw_gas":3700,"temp":70,"humidity":15}"#)
            .await
    );
    assert_eq!(fire.status, RiskStatus::Critical);
    assert!(fire.record.fire_risk_percent > 90.0);

    assert_eq!(sink.records().len(), 2);
}
