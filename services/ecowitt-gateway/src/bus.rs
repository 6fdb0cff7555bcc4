use std::time::Duration;

use anyhow::Context;
use rumqttc::{
    AsyncClient, Event, EventLoop, Incoming, MqttOptions, Outgoing, QoS, TlsConfiguration,
    Transport,
};
use tokio::fs;

use crate::config::MqttSettings;
use crate::types::Delta;

/// Source label every delta from this service is published under.
pub const SOURCE_ID: &str = "signalk-ecowitt";

/// Receiver of converted batches, e.g. a Signal K server's message bus.
pub trait MessageBus: Send + Sync + 'static {
    fn handle_message(&self, source: &str, delta: Delta) -> anyhow::Result<()>;
}

/// Publishes deltas as JSON to `<topic_prefix><source>`.
pub struct MqttBus {
    client: AsyncClient,
    topic_prefix: String,
}

impl MqttBus {
    pub fn new(client: AsyncClient, topic_prefix: impl Into<String>) -> Self {
        Self {
            client,
            topic_prefix: topic_prefix.into(),
        }
    }

    pub fn topic(&self, source: &str) -> String {
        format!("{}{}", self.topic_prefix, source)
    }
}

impl MessageBus for MqttBus {
    fn handle_message(&self, source: &str, delta: Delta) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(&delta).context("serialize delta")?;
        let topic = self.topic(source);
        self.client
            .try_publish(topic.clone(), QoS::AtLeastOnce, false, payload)
            .with_context(|| format!("mqtt publish to {topic}"))?;
        let values: usize = delta.updates.iter().map(|u| u.len()).sum();
        tracing::debug!(%topic, values, "delta queued");
        Ok(())
    }
}

/// Build the MQTT client; TLS is used when a CA path is configured.
pub async fn connect(settings: &MqttSettings) -> anyhow::Result<(AsyncClient, EventLoop)> {
    tracing::info!(
        "mqtt -> {}:{} as {}",
        settings.host,
        settings.port,
        settings.client_id
    );
    let mut opts = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
    opts.set_keep_alive(Duration::from_secs(30));
    if let Some((username, password)) = &settings.credentials {
        opts.set_credentials(username, password);
    }

    if let Some(ca_path) = &settings.ca_path {
        let ca = fs::read(ca_path)
            .await
            .with_context(|| format!("failed to read MQTT_CA_PATH at {ca_path}"))?;
        let client_auth = match (&settings.cert_path, &settings.key_path) {
            (Some(cert_path), Some(key_path)) => {
                let cert = fs::read(cert_path)
                    .await
                    .with_context(|| format!("failed to read MQTT_CERT_PATH at {cert_path}"))?;
                let key = fs::read(key_path)
                    .await
                    .with_context(|| format!("failed to read MQTT_KEY_PATH at {key_path}"))?;
                Some((cert, key))
            }
            (None, None) => None,
            _ => {
                tracing::warn!(
                    "MQTT client certificate/key not fully specified; proceeding without client auth"
                );
                None
            }
        };
        opts.set_transport(Transport::tls_with_config(TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth,
        }));
    }

    Ok(AsyncClient::new(opts, 32))
}

/// Drive the MQTT event loop until the task is dropped.
pub async fn drive(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(inc)) => match inc {
                Incoming::ConnAck(ack) => tracing::info!("mqtt connected: {ack:?}"),
                Incoming::PubAck(ack) => tracing::debug!("mqtt puback <- pkid={}", ack.pkid),
                other => tracing::trace!("mqtt incoming: {other:?}"),
            },
            Ok(Event::Outgoing(out)) => match out {
                Outgoing::Publish(pkid) => tracing::trace!("mqtt publish -> pkid={}", pkid),
                other => tracing::trace!("mqtt outgoing: {other:?}"),
            },
            Err(e) => {
                tracing::error!("mqtt eventloop error: {e}; retrying in 2s");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
