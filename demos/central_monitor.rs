//! Monitor a real rangefinder over Bluetooth
//!
//! Scans for the rangefinder service, subscribes and prints each distance
//! with the running min/max.
//!
//! Run with: cargo run --example central_monitor
//!
//! To keep scanning after the link drops:
//!   cargo run --example central_monitor -- --rescan

use rangefinder_link::{
    BtleplugCentral, CentralConfig, CentralSession, MalformedFramePolicy, ReconnectPolicy, Result,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rangefinder_link=debug".parse().unwrap()),
        )
        .init();

    println!("Rangefinder Monitor");
    println!("===================\n");

    let args: Vec<String> = std::env::args().collect();
    let mut config = CentralConfig::default();
    if args.iter().any(|arg| arg == "--rescan") {
        config = config.with_reconnect(ReconnectPolicy::Rescan);
    }
    if args.iter().any(|arg| arg == "--lossy") {
        config = config.with_malformed_frames(MalformedFramePolicy::TreatAsZero);
    }

    let transport = Arc::new(BtleplugCentral::new().await?);
    let mut central = CentralSession::new(transport, config)?;

    let mut readings = central.subscribe_readings();
    tokio::spawn(async move {
        while let Ok(reading) = readings.recv().await {
            println!(
                "Distance: {:>6.2} cm   max: {:>6.2} cm   min: {:>6.2} cm",
                reading.distance_cm, reading.extrema.max, reading.extrema.min
            );
        }
    });

    println!("Looking for rangefinder...");
    println!("Press Ctrl+C to exit.\n");

    let settled = tokio::select! {
        state = central.run() => Some(state),
        _ = tokio::signal::ctrl_c() => None,
    };

    match settled {
        Some(state) => println!("\nSession ended: {}", state),
        None => {
            println!("\nExiting...");
            central.disconnect().await?;
        }
    }

    Ok(())
}
