//! Telemetry simulator: publishes plausible PZEM-style readings to the
//! broker so the hub can be exercised without hardware.

use std::time::Duration;

use clap::Parser;
use rand::Rng;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde_json::json;
use tracing::{debug, error, info, level_filters::LevelFilter};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};
use wattgrid::util;

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Broker host
    #[arg(long, default_value = "localhost")]
    broker: String,

    /// Broker port
    #[arg(long, default_value_t = 1883)]
    port: u16,

    /// Topic to publish on
    #[arg(long, default_value = "wattgrid/energy/sim")]
    topic: String,

    /// Device id reported in the payload
    #[arg(long, default_value = "ESP32_PZEM")]
    device: String,

    /// Seconds between samples
    #[arg(long, default_value_t = 2)]
    interval: u64,

    /// Occasionally emit an out-of-threshold sample
    #[arg(long, default_value_t = false)]
    spikes: bool,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("wattgrid", LevelFilter::DEBUG),
        ("wattgrid_sim", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();

    let client_id = format!("wattgrid-sim-{}", std::process::id());
    let mut options = MqttOptions::new(&client_id, &args.broker, args.port);
    options.set_keep_alive(Duration::from_secs(15));

    let (client, mut eventloop) = AsyncClient::new(options, 10);

    // drive the connection in the background; we only publish
    tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                error!("mqtt connection error: {e}, retrying in 2s");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    info!(
        "publishing simulated telemetry for {} to {}:{} on {}",
        args.device, args.broker, args.port, args.topic
    );

    let mut energy_kwh: f64 = 0.0;

    loop {
        let payload = {
            let mut rng = rand::thread_rng();

            let spike = args.spikes && rng.gen_range(0..10) == 0;
            let voltage: f64 = if spike {
                rng.gen_range(180.0..260.0)
            } else {
                230.0 + rng.gen_range(-4.0..4.0)
            };
            let current: f64 = if spike {
                rng.gen_range(10.0..16.0)
            } else {
                rng.gen_range(0.5..6.0)
            };
            let power_factor: f64 = rng.gen_range(0.85..1.0);
            let power = voltage * current * power_factor;
            let frequency: f64 = 50.0 + rng.gen_range(-0.2..0.2);

            energy_kwh += power / 1000.0 * (args.interval as f64 / 3600.0);

            json!({
                "device_id": args.device,
                "timestamp": util::now_ms(),
                "voltage": (voltage * 100.0).round() / 100.0,
                "current": (current * 1000.0).round() / 1000.0,
                "power": (power * 100.0).round() / 100.0,
                "energy": (energy_kwh * 10_000.0).round() / 10_000.0,
                "frequency": (frequency * 10.0).round() / 10.0,
                "pf": (power_factor * 1000.0).round() / 1000.0,
            })
        };

        match client
            .publish(
                &args.topic,
                QoS::AtLeastOnce,
                false,
                serde_json::to_vec(&payload)?,
            )
            .await
        {
            Ok(()) => debug!("published {payload}"),
            Err(e) => error!("failed to publish sample: {e}"),
        }

        tokio::time::sleep(Duration::from_secs(args.interval)).await;
    }
}
