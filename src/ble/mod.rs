//! Bluetooth Low Energy subsystem.
//!
//! Central-role client for the Heart Rate Service, in two layers:
//!
//! 1. **Portable core** - the advertisement parser (`adv_parser`), the
//!    GATT discovery/subscription state machine (`discovery`), and the
//!    single-connection driver over an abstract transport (`central`).
//!    All of it is `no_std`, radio-free, and host-testable.
//! 2. **Embedded shell** (`embedded` feature) - `scanner`, `hrs_client`
//!    and `monitor` drive the Nordic SoftDevice S140 in Central role and
//!    hand decoded measurements to the telemetry task over an Embassy
//!    channel.

pub mod adv_parser;
pub mod central;
pub mod discovery;

#[cfg(feature = "embedded")]
pub mod hrs_client;
#[cfg(feature = "embedded")]
pub mod monitor;
#[cfg(feature = "embedded")]
pub mod scanner;

#[cfg(feature = "embedded")]
use defmt::Format;
#[cfg(feature = "embedded")]
use heapless::String;
#[cfg(feature = "embedded")]
use nrf_softdevice::ble::Address;

/// Information about a discovered BLE peripheral.
#[cfg(feature = "embedded")]
#[derive(Clone, Format)]
pub struct DiscoveredDevice {
    /// BLE address.
    pub address: Address,
    /// Human-readable name (truncated to 32 bytes for `heapless::String`).
    pub name: String<32>,
    /// Received Signal Strength Indicator (dBm).
    pub rssi: i8,
}

/// Lightweight error tag for log output (no dynamic alloc).
#[cfg(feature = "embedded")]
#[derive(Clone, Copy, Format)]
pub enum BleErrorTag {
    ScanFailed,
    ConnectFailed,
    HrsNotFound,
    SubscribeFailed,
}
