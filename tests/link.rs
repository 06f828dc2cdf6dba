//! Both roles joined over the in-process loopback transport.

use pretty_assertions::assert_eq;
use rangefinder_link::{
    CentralConfig, CentralSession, CentralState, Extrema, Loopback, PeripheralConfig,
    PeripheralSession, PeripheralState,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SECOND: Duration = Duration::from_secs(1);

async fn linked() -> (
    Arc<Loopback>,
    PeripheralSession<Loopback>,
    CentralSession<Loopback>,
) {
    let loopback = Arc::new(Loopback::with_local_name("XIAO_ESP32S3_liliana"));

    let mut peripheral =
        PeripheralSession::new(loopback.clone(), PeripheralConfig::default()).unwrap();
    peripheral.start().await.unwrap();

    let mut central = CentralSession::new(loopback.clone(), CentralConfig::default()).unwrap();
    assert_eq!(central.establish().await, CentralState::Subscribed);

    (loopback, peripheral, central)
}

#[tokio::test]
async fn steady_distance_reaches_central() {
    let (loopback, mut peripheral, central) = linked().await;
    let mut readings = central.subscribe_readings();

    for _ in 0..9 {
        peripheral.ingest(25.0);
    }
    let frame = peripheral.sample_and_tick(Instant::now(), 25.0).await;

    assert_eq!(peripheral.state(), PeripheralState::Connected);
    assert_eq!(frame.as_deref(), Some("Distance: 25.00 cm"));
    assert_eq!(loopback.delivered_count(), 1);

    let reading = readings.try_recv().unwrap();
    assert!((reading.distance_cm - 25.0).abs() < 1e-3);
    assert_eq!(central.extrema(), Extrema { max: 25.0, min: 25.0 });
}

#[tokio::test]
async fn only_near_readings_are_notified() {
    let (loopback, mut peripheral, central) = linked().await;

    let t0 = Instant::now();
    for (i, filtered) in [31.0, 29.9, 15.0].into_iter().enumerate() {
        peripheral.tick(t0 + SECOND * i as u32, filtered).await;
    }

    assert_eq!(loopback.delivered_count(), 2);
    assert_eq!(central.reading_count(), 2);
    assert_eq!(central.extrema(), Extrema { max: 29.9, min: 15.0 });
}

#[tokio::test]
async fn filter_warms_up_before_first_full_reading() {
    let (_loopback, mut peripheral, central) = linked().await;

    let t0 = Instant::now();
    for i in 0..10u32 {
        peripheral.sample_and_tick(t0 + SECOND * i, 20.0).await;
    }

    // 2.0, 4.0, ... 20.0 as the window fills
    assert_eq!(central.reading_count(), 10);
    assert_eq!(central.extrema(), Extrema { max: 20.0, min: 2.0 });
}

#[tokio::test]
async fn link_loss_then_readvertise_and_rescan() {
    let (loopback, mut peripheral, mut central) = linked().await;

    let t0 = Instant::now();
    peripheral.tick(t0, 12.0).await;
    assert_eq!(central.reading_count(), 1);

    loopback.sever();
    assert_eq!(central.state(), CentralState::Disconnected);

    let detached = t0 + SECOND;
    peripheral.tick(detached, 12.0).await;
    assert_eq!(peripheral.state(), PeripheralState::Idle);

    peripheral
        .tick(detached + Duration::from_millis(499), 12.0)
        .await;
    assert!(!loopback.is_advertising());

    peripheral
        .tick(detached + Duration::from_millis(500), 12.0)
        .await;
    assert_eq!(peripheral.state(), PeripheralState::Advertising);

    central.rescan();
    assert_eq!(central.establish().await, CentralState::Subscribed);

    peripheral.tick(detached + SECOND * 2, 18.0).await;
    assert_eq!(peripheral.state(), PeripheralState::Connected);

    // extrema span both connections by default
    assert_eq!(central.reading_count(), 2);
    assert_eq!(central.extrema(), Extrema { max: 18.0, min: 12.0 });
}
