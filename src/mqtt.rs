//! MQTT subscriber feeding the ingestion pipeline
//!
//! The broker connection, keep-alive and redelivery are rumqttc's problem;
//! this task only subscribes to the telemetry channels and hands each
//! publish to the pipeline. Subscriptions are (re)issued on every ConnAck
//! so they survive reconnects. Delivery is at-least-once; the pipeline
//! tolerates duplicates.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{config::MqttConfig, ingest::IngestPipeline};

pub fn spawn_subscriber(config: MqttConfig, pipeline: IngestPipeline) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut options = MqttOptions::new(&config.client_id, &config.broker, config.port);
        options.set_keep_alive(Duration::from_secs(15));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 10);

        info!(
            "connecting to mqtt broker {}:{} as {}",
            config.broker, config.port, config.client_id
        );

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    debug!("connected to broker {}:{}", config.broker, config.port);

                    // subscriptions do not survive a reconnect
                    for topic in &config.topics {
                        match client.subscribe(topic, QoS::AtLeastOnce).await {
                            Ok(()) => info!("subscribed to {topic}"),
                            Err(e) => error!("failed to subscribe to {topic}: {e}"),
                        }
                    }
                }

                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    pipeline.ingest(&publish.topic, &publish.payload).await;
                }

                Ok(_) => {}

                Err(e) => {
                    warn!("mqtt connection error: {e}, retrying in 2s");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    })
}
