//! Drive a simulated inverter through a connect / sync / exit cycle.
//!
//! Run with `RUST_LOG=pwm_link=debug cargo run --example simulated_link`.

use std::time::Duration;

use pwm_link::codec::ModulationIndexCode;
use pwm_link::simulator::{SimulatedDevice, SimulatedOpener};
use pwm_link::{ConnectResult, LinkConfig, LinkHandle, Setpoint, SyncPayload, SyncSubmission};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> pwm_link::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let device = SimulatedDevice::inverter(ModulationIndexCode::MIN)
        .ack_delay(Duration::from_millis(30))
        .drop_sync_acks(1);
    let opener = SimulatedOpener::new().with_device("sim0", device.clone());
    let mut link = LinkHandle::spawn(opener, LinkConfig::new())?;

    match link.connect("sim0").await {
        ConnectResult::Connected(setpoint) => tracing::info!(?setpoint, "device setpoint"),
        other => {
            tracing::error!(?other, status = %link.status(), "connect failed");
            return link.shutdown().await;
        }
    }

    // Sweep the modulation index the way a slider would, polling every 20 ms.
    let mut skipped = 0;
    for step in 0..=15 {
        let setpoint = Setpoint::Inverter {
            modulation_index: 0.80 + step as f64 * 0.01,
        };
        if link.sync(setpoint)? != SyncSubmission::Submitted {
            skipped += 1;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(800)).await;

    let held = match device.setpoint() {
        SyncPayload::Modulation(code) => code.to_string(),
        other => format!("{other:?}"),
    };
    tracing::info!(status = %link.poll(), skipped, device = %held, "sweep finished");

    link.exit();
    link.shutdown().await
}
