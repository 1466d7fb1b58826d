//! GATT discovery/subscription state machine.
//!
//! A [`DiscoverySession`] walks a peer's attribute table in three ordered
//! steps - primary service, characteristic, CCC descriptor - then asks for
//! a notification subscription. Each step consumes exactly one discovered
//! attribute and emits exactly one follow-up request.
//!
//! The session itself is pure state: transitions return the request to
//! issue, and the caller (see [`crate::ble::central`]) owns the transport
//! that actually sends it. That keeps the whole handshake testable on the
//! host without a radio.

use crate::config::{GATT_HANDLE_MAX, GATT_HANDLE_MIN};

/// Attribute discovery kinds issued against the peer's attribute table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoverKind {
    PrimaryService,
    Characteristic,
    Descriptor,
}

/// Discovery progress. `value_handle` rides along once the characteristic
/// declaration has been seen, so a subscribe can never be built without it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    /// No discovery in flight (fresh session whose opening request was
    /// rejected, or no session at all).
    Idle,
    DiscoverPrimaryService,
    DiscoverCharacteristic,
    DiscoverDescriptor { value_handle: u16 },
    /// Terminal: the subscribe request has been handed to the transport.
    Subscribed { value_handle: u16 },
}

/// The three 16-bit UUIDs a session walks, in discovery order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UuidChain {
    /// Primary service to locate.
    pub service: u16,
    /// Characteristic inside that service.
    pub characteristic: u16,
    /// Notification-configuration descriptor (CCC) of that characteristic.
    pub descriptor: u16,
}

/// An outbound attribute-discovery request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoverRequest {
    pub kind: DiscoverKind,
    pub uuid: u16,
    pub start_handle: u16,
    pub end_handle: u16,
}

/// An outbound CCC-write subscription request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubscribeRequest {
    /// Handle of the CCC descriptor to write.
    pub ccc_handle: u16,
    /// Handle notifications will be delivered against.
    pub value_handle: u16,
    pub enable_notify: bool,
}

/// Side effect a transition asks the caller to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    Discover(DiscoverRequest),
    Subscribe(SubscribeRequest),
}

/// Signal returned to the attribute-discovery engine: keep iterating over
/// further matches of the in-flight request, or stop after this one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IterControl {
    Continue,
    Stop,
}

/// Per-connection discovery state. Created on connect, advanced only by
/// [`Self::on_attribute_found`], discarded on disconnect.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoverySession {
    chain: UuidChain,
    stage: Stage,
    start_handle: u16,
    end_handle: u16,
}

impl DiscoverySession {
    /// Start a fresh session over the full handle range and produce the
    /// opening primary-service discovery request.
    pub fn begin(chain: UuidChain) -> (Self, DiscoverRequest) {
        let session = Self {
            chain,
            stage: Stage::DiscoverPrimaryService,
            start_handle: GATT_HANDLE_MIN,
            end_handle: GATT_HANDLE_MAX,
        };
        let request = DiscoverRequest {
            kind: DiscoverKind::PrimaryService,
            uuid: chain.service,
            start_handle: GATT_HANDLE_MIN,
            end_handle: GATT_HANDLE_MAX,
        };
        (session, request)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Resolved characteristic value handle, once the characteristic
    /// declaration has been discovered.
    pub fn value_handle(&self) -> Option<u16> {
        match self.stage {
            Stage::DiscoverDescriptor { value_handle } | Stage::Subscribed { value_handle } => {
                Some(value_handle)
            }
            _ => None,
        }
    }

    /// Drop back to `Idle` after the opening request was rejected. The
    /// session stays inert until the connection goes away.
    pub fn park(&mut self) {
        self.stage = Stage::Idle;
    }

    /// Advance on one matching attribute reported by the discovery engine.
    ///
    /// The transition is committed before the returned [`Action`] is
    /// issued; if the caller fails to issue it, the session simply stays
    /// parked in the new stage (no rollback, no retry).
    ///
    /// Handle arithmetic saturates: a peer reporting an attribute at
    /// 0xFFFF produces a degenerate window, never a wrap or panic.
    pub fn on_attribute_found(&mut self, handle: u16) -> (IterControl, Option<Action>) {
        match self.stage {
            Stage::DiscoverPrimaryService => {
                // Service declaration found; look for the characteristic
                // strictly after it.
                self.start_handle = handle.saturating_add(1);
                self.stage = Stage::DiscoverCharacteristic;
                let request = DiscoverRequest {
                    kind: DiscoverKind::Characteristic,
                    uuid: self.chain.characteristic,
                    start_handle: self.start_handle,
                    end_handle: self.end_handle,
                };
                (IterControl::Stop, Some(Action::Discover(request)))
            }
            Stage::DiscoverCharacteristic => {
                // `handle` is the characteristic declaration; its value
                // attribute sits right behind it. Skip both when hunting
                // for the CCC descriptor.
                let value_handle = handle.saturating_add(1);
                self.start_handle = handle.saturating_add(2);
                self.stage = Stage::DiscoverDescriptor { value_handle };
                let request = DiscoverRequest {
                    kind: DiscoverKind::Descriptor,
                    uuid: self.chain.descriptor,
                    start_handle: self.start_handle,
                    end_handle: self.end_handle,
                };
                (IterControl::Stop, Some(Action::Discover(request)))
            }
            Stage::DiscoverDescriptor { value_handle } => {
                self.stage = Stage::Subscribed { value_handle };
                let request = SubscribeRequest {
                    ccc_handle: handle,
                    value_handle,
                    enable_notify: true,
                };
                (IterControl::Stop, Some(Action::Subscribe(request)))
            }
            // Parked or already terminal: nothing left to do with
            // stray attribute reports.
            Stage::Idle | Stage::Subscribed { .. } => (IterControl::Stop, None),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
