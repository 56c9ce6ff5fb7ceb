//! Message channel.
//!
//! The ingestion loop pulls [`ChannelEvent`]s from a [`MessageSource`]. The
//! MQTT implementation owns connection supervision: it reports losing the
//! broker as `Disconnected`, keeps retrying on its own schedule, and reports
//! `Connected` once subscribed again.

use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::time::Duration;

use paho_mqtt::{AsyncClient as MqttClient, AsyncReceiver, ConnectOptionsBuilder, CreateOptionsBuilder, Message as MqttMessage};

/// Default number of messages buffered ahead of the ingestion loop.
pub const DEFAULT_STREAM_BUFFER: usize = 1024;

/// A single delivered message.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Subscribed and ready to deliver.
    Connected,
    /// The connection is down; the source is retrying.
    Disconnected,
    Message(InboundMessage),
}

/// Pull-based channel consumer.
pub trait MessageSource: Send {
    /// Wait for the next event. `None` means the channel is closed for good.
    fn next_event(&mut self) -> impl Future<Output = Option<ChannelEvent>> + Send;
}

/// Subscriber to the telemetry topic on an MQTT broker.
pub struct MqttSource {
    client: MqttClient,
    stream: AsyncReceiver<Option<MqttMessage>>,
    topic: String,
    reconnect_delay: Duration,
    connected: bool,
}

impl MqttSource {
    // ---
    pub fn new(server_uri: &str, client_id: &str, topic: &str, reconnect_delay: Duration) -> Result<MqttSource, Error> {
        Self::with_buffer(server_uri, client_id, topic, reconnect_delay, DEFAULT_STREAM_BUFFER)
    }

    /// Like [`MqttSource::new`] with an explicit inbound buffer size.
    ///
    /// The client drops messages that arrive while the buffer is full, for
    /// example while the loop waits out a run of stalled database writes.
    /// Size the buffer for the longest stall the deployment should absorb.
    pub fn with_buffer(
        server_uri: &str,
        client_id: &str,
        topic: &str,
        reconnect_delay: Duration,
        buffer: usize,
    ) -> Result<MqttSource, Error> {
        // ---
        let mut client = MqttClient::new(
            CreateOptionsBuilder::new()
                .server_uri(server_uri)
                .client_id(client_id)
                .finalize(),
        )?;

        // The stream must exist before the first connect.
        let stream = client.get_stream(buffer.max(1));

        Ok(MqttSource {
            client,
            stream,
            topic: topic.to_string(),
            reconnect_delay,
            connected: false,
        })
    }

    /// Connect to the broker (if needed) and subscribe to the topic.
    #[tracing::instrument(skip(self), fields(topic = %self.topic), err)]
    async fn establish(&self) -> Result<(), Error> {
        // ---
        if !self.client.is_connected() {
            tracing::info!("connect to the MQTT broker");
            let conn_opts = ConnectOptionsBuilder::new()
                .keep_alive_interval(Duration::from_secs(60))
                .clean_session(true)
                .finalize();
            let response = self.client.connect(conn_opts).await?;
            tracing::info!(info = ?response, "connected to the MQTT broker");
        }

        self.client.subscribe(&self.topic, 1).await?;
        tracing::info!("listening for telemetry");
        Ok(())
    }

    /// Disconnect from the broker, ignoring a connection that is already gone.
    pub async fn disconnect(&self) {
        // ---
        if self.client.is_connected() {
            if let Err(e) = self.client.disconnect(None).await {
                tracing::warn!(error = %e, "failed to disconnect from the MQTT broker");
            }
        }
    }
}

impl MessageSource for MqttSource {
    // ---
    async fn next_event(&mut self) -> Option<ChannelEvent> {
        // ---
        if !self.connected {
            return match self.establish().await {
                Ok(()) => {
                    self.connected = true;
                    Some(ChannelEvent::Connected)
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        retry_in = ?self.reconnect_delay,
                        "could not reach the MQTT broker"
                    );
                    tokio::time::sleep(self.reconnect_delay).await;
                    Some(ChannelEvent::Disconnected)
                }
            };
        }

        match self.stream.recv().await {
            Ok(Some(msg)) => Some(ChannelEvent::Message(InboundMessage {
                topic: msg.topic().to_string(),
                payload: msg.payload().to_vec(),
            })),
            Ok(None) => {
                tracing::warn!("lost connection to the MQTT broker");
                self.connected = false;
                Some(ChannelEvent::Disconnected)
            }
            Err(_) => None,
        }
    }
}

impl Debug for MqttSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttSource")
            .field("topic", &self.topic)
            .field("connected", &self.connected)
            .finish()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("MQTT client: {0}")]
    Mqtt(#[from] paho_mqtt::Error),
}
