//! Both roles in one process over the loopback transport
//!
//! A replayed sensor walks an object towards the rangefinder while a
//! central prints every reading it receives.
//!
//! Run with: cargo run --example loopback_link

use rangefinder_link::{
    CentralConfig, CentralSession, Loopback, PeripheralConfig, PeripheralSession, ReplaySensor,
    Result,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rangefinder_link=debug".parse().unwrap()),
        )
        .init();

    println!("Rangefinder Loopback Link");
    println!("=========================\n");

    let loopback = Arc::new(Loopback::with_local_name("XIAO_ESP32S3_liliana"));

    // Sample five times per second so the filter moves quickly
    let config = PeripheralConfig::default().with_sample_interval(Duration::from_millis(200));
    let mut peripheral = PeripheralSession::new(loopback.clone(), config)?;
    let mut sensor =
        ReplaySensor::from_centimeters(&[45.0, 40.0, 35.0, 28.0, 22.0, 18.0, 15.0, 12.0, 10.0, 8.0]);

    let peripheral_task = tokio::spawn(async move { peripheral.run(&mut sensor).await });

    // Give the peripheral time to start advertising
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut central = CentralSession::new(loopback.clone(), CentralConfig::default())?;
    let mut readings = central.subscribe_readings();

    let state = central.establish().await;
    println!("Central state: {}\n", state);

    let deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                println!("\nExiting...");
                break;
            }
            reading = readings.recv() => match reading {
                Ok(reading) => println!(
                    "[{}] {:>6.2} cm   min {:>6.2} cm   max {:>6.2} cm",
                    reading.received_at.format("%H:%M:%S%.3f"),
                    reading.distance_cm,
                    reading.extrema.min,
                    reading.extrema.max
                ),
                Err(_) => break,
            },
        }
    }

    central.disconnect().await?;
    peripheral_task.abort();

    let extrema = central.extrema();
    println!("\nReadings: {}", central.reading_count());
    println!("Closest:  {:.2} cm", extrema.min);
    println!("Farthest: {:.2} cm", extrema.max);

    Ok(())
}
