//! BLE GAP scanner - finds a heart-rate peripheral.
//!
//! Uses the SoftDevice Central-role scanning API. Every advertisement
//! report is run through the AD parser; the first peripheral carrying the
//! Heart Rate Service UUID stops the scan and is handed back for
//! connection.

use crate::ble::adv_parser::{advertises_service_uuid16, extract_device_name};
use crate::ble::{BleErrorTag, DiscoveredDevice};
use crate::config::UUID_HEART_RATE_SERVICE;
use defmt::info;
use nrf_softdevice::ble::central;
use nrf_softdevice::Softdevice;

/// Scan until a peripheral advertising the Heart Rate Service shows up.
///
/// There is no scan window: with nothing in range this future simply
/// keeps listening until the caller drops it.
pub async fn find_heart_rate_peripheral(
    sd: &Softdevice,
) -> Result<DiscoveredDevice, BleErrorTag> {
    let config = central::ScanConfig {
        // Active scan to retrieve scan-response data (device names).
        active: true,
        ..Default::default()
    };

    let device = central::scan(sd, &config, |params| {
        let data =
            unsafe { core::slice::from_raw_parts(params.data.p_data, params.data.len as usize) };

        if !advertises_service_uuid16(data, UUID_HEART_RATE_SERVICE) {
            return None; // keep scanning
        }

        Some(DiscoveredDevice {
            address: nrf_softdevice::ble::Address::from_raw(params.peer_addr),
            name: extract_device_name(data),
            rssi: params.rssi,
        })
    })
    .await
    .map_err(|_| BleErrorTag::ScanFailed)?;

    info!(
        "found heart-rate peripheral {} (RSSI {})",
        device.name.as_str(),
        device.rssi
    );
    Ok(device)
}
