//! Connection monitor - the central's main loop.
//!
//! Scan -> connect -> discover & subscribe -> stream measurements, then
//! back to scanning once the peripheral drops the link. Exactly one
//! connection is maintained at a time.

use crate::ble::{hrs_client, scanner, BleErrorTag};
use crate::config;
use crate::hrm::HeartRateMeasurement;
use defmt::{info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Timer};
use nrf_softdevice::ble::central;
use nrf_softdevice::raw;
use nrf_softdevice::Softdevice;

/// Run the monitor forever.
pub async fn run(
    sd: &'static Softdevice,
    meas_tx: &Sender<'static, CriticalSectionRawMutex, HeartRateMeasurement, 16>,
) -> ! {
    loop {
        match monitor_once(sd, meas_tx).await {
            // Clean disconnect: rescan right away, the strap may come back.
            Ok(()) => {}
            Err(tag) => {
                warn!("monitor pass failed: {}", tag);
                // Give the radio a moment before trying again.
                Timer::after(Duration::from_millis(config::RECONNECT_BACKOFF_MS)).await;
            }
        }
    }
}

/// One scan/connect/stream pass. Returns when the connection closes.
async fn monitor_once(
    sd: &'static Softdevice,
    meas_tx: &Sender<'static, CriticalSectionRawMutex, HeartRateMeasurement, 16>,
) -> Result<(), BleErrorTag> {
    let device = scanner::find_heart_rate_peripheral(sd).await?;

    let whitelist = [&device.address];
    let conn_cfg = central::ConnectConfig {
        scan_config: central::ScanConfig {
            whitelist: Some(&whitelist),
            ..Default::default()
        },
        conn_params: raw::ble_gap_conn_params_t {
            min_conn_interval: config::BLE_CONN_INTERVAL_MIN,
            max_conn_interval: config::BLE_CONN_INTERVAL_MAX,
            slave_latency: config::BLE_SLAVE_LATENCY,
            conn_sup_timeout: config::BLE_SUP_TIMEOUT,
        },
        ..Default::default()
    };

    let conn = central::connect(sd, &conn_cfg)
        .await
        .map_err(|_| BleErrorTag::ConnectFailed)?;
    info!("connected to {}", device.name.as_str());

    let client = hrs_client::discover_and_subscribe(&conn).await?;
    hrs_client::run_notification_loop(&conn, &client, meas_tx).await;

    info!("disconnected from {} - resuming scan", device.name.as_str());
    Ok(())
}
