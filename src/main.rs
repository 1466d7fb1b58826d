//! Firmware entry point for the nRF52840 heart-rate central.
//!
//! Brings up the SoftDevice in Central role and runs two tasks next to
//! it: the connection monitor (scan/connect/subscribe/stream) and a
//! telemetry task that logs decoded measurements arriving over the
//! channel between them.

#![no_std]
#![no_main]

use defmt_rtt as _;
use panic_probe as _;

use core::mem;

use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_nrf::interrupt::Priority;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use nrf_softdevice::{raw, Softdevice};

use hrcentral::ble::monitor;
use hrcentral::hrm::HeartRateMeasurement;

/// Decoded measurements, BLE task -> telemetry task.
static MEASUREMENTS: Channel<CriticalSectionRawMutex, HeartRateMeasurement, 16> = Channel::new();

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn monitor_task(sd: &'static Softdevice) -> ! {
    let meas_tx = MEASUREMENTS.sender();
    monitor::run(sd, &meas_tx).await
}

#[embassy_executor::task]
async fn telemetry_task() -> ! {
    let meas_rx = MEASUREMENTS.receiver();
    loop {
        let meas = meas_rx.receive().await;
        match meas.sensor_contact {
            Some(false) => info!("heart rate: {} bpm (no sensor contact)", meas.bpm),
            _ => info!("heart rate: {} bpm", meas.bpm),
        }
        if !meas.rr_intervals.is_empty() {
            info!("rr intervals (1/1024 s): {}", meas.rr_intervals.as_slice());
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("heart-rate central starting");

    // The SoftDevice reserves the highest interrupt priorities; keep
    // embassy's drivers below them.
    let mut hal_config = embassy_nrf::config::Config::default();
    hal_config.gpiote_interrupt_priority = Priority::P2;
    hal_config.time_interrupt_priority = Priority::P2;
    let _p = embassy_nrf::init(hal_config);

    let config = nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 23 }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: b"hrcentral" as *const u8 as _,
            current_len: 9,
            max_len: 9,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    };

    let sd = Softdevice::enable(&config);

    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(monitor_task(sd)));
    unwrap!(spawner.spawn(telemetry_task()));
}
