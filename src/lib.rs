//! Portable core of the hrcentral firmware.
//!
//! Everything here is `no_std` and radio-free: the advertisement parser,
//! the GATT discovery/subscription state machine, and the heart-rate
//! measurement decoder operate on byte slices and explicit state, so the
//! whole protocol core runs under plain `cargo test` on the host.
//!
//! The embedded binary (`--features embedded`, see `src/main.rs`) wires
//! these pieces to the Nordic SoftDevice S140 on an nRF52840.

#![cfg_attr(not(test), no_std)]

pub mod ble;
pub mod config;
pub mod hrm;
