//! BLE GATT heart-rate client - discovers the Heart Rate Service on a
//! connected peripheral and subscribes to measurement notifications.
//!
//! After the GAP connection is established, this module:
//! 1. Discovers the Heart Rate Service (UUID 0x180D).
//! 2. Locates the Heart Rate Measurement characteristic (UUID 0x2A37)
//!    and its CCC descriptor.
//! 3. Writes the CCCD to enable notifications.
//! 4. Decodes received measurements and forwards them to the telemetry
//!    task via a channel.
//!
//! The SoftDevice performs the service -> characteristic -> descriptor
//! walk internally; [`crate::ble::discovery`] models the same handshake
//! for transports that report attributes one at a time.

use crate::ble::BleErrorTag;
use crate::hrm::HeartRateMeasurement;
use defmt::{info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use nrf_softdevice::ble::{gatt_client, Connection};

/// nrf-softdevice GATT client struct for the Heart Rate Service.
///
/// The `#[nrf_softdevice::gatt_client]` macro generates discovery and
/// notify helpers for the listed characteristics.
#[nrf_softdevice::gatt_client(uuid = "180d")]
pub struct HeartRateServiceClient {
    /// Heart Rate Measurement - notifications carry the live payload.
    #[characteristic(uuid = "2a37", notify)]
    pub heart_rate_measurement: [u8; 20],
}

/// Discover the Heart Rate Service on the connected peripheral and
/// enable measurement notifications.
///
/// Returns the `HeartRateServiceClient` on success so the caller can
/// manage the subscription lifetime.
pub async fn discover_and_subscribe(
    conn: &Connection,
) -> Result<HeartRateServiceClient, BleErrorTag> {
    info!("discovering heart rate service...");

    let client: HeartRateServiceClient = gatt_client::discover(conn)
        .await
        .map_err(|_| BleErrorTag::HrsNotFound)?;

    // Enable CCCD notifications. Re-enabling an already-active
    // subscription is accepted by the peer, so this is safe to repeat.
    client
        .heart_rate_measurement_cccd_write(true)
        .await
        .map_err(|_| BleErrorTag::SubscribeFailed)?;

    info!("subscribed to heart rate measurements");
    Ok(client)
}

/// Run the notification listener loop.
///
/// Blocks until the connection drops. Each received measurement is
/// decoded and sent to `meas_tx` for the telemetry task to consume.
pub async fn run_notification_loop(
    conn: &Connection,
    client: &HeartRateServiceClient,
    meas_tx: &Sender<'_, CriticalSectionRawMutex, HeartRateMeasurement, 16>,
) {
    info!("heart-rate notification loop started");

    let _result = gatt_client::run(conn, client, |event| match event {
        HeartRateServiceClientEvent::HeartRateMeasurementNotification(data) => {
            if data.is_empty() {
                // Zero-length keep-alive; nothing to surface.
                return;
            }
            match HeartRateMeasurement::parse(&data) {
                Some(meas) => {
                    // try_send avoids blocking; if telemetry is behind, we drop.
                    if meas_tx.try_send(meas).is_err() {
                        warn!("measurement channel full - dropping");
                    }
                }
                None => warn!("unparseable measurement payload ({} bytes)", data.len()),
            }
        }
    })
    .await;

    info!("heart-rate notification loop ended (connection closed)");
}
