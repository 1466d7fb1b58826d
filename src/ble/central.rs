//! Single-connection central driver.
//!
//! [`Central`] tracks one peer connection, owns its [`DiscoverySession`],
//! and issues the session's requests over a [`GattLink`] - the
//! discover/subscribe surface of whatever BLE host stack is underneath.
//! All callbacks are delivered serially by the surrounding dispatcher;
//! the driver holds no locks and assumes none.
//!
//! Outstanding requests carry no timeout: a peer that never answers a
//! discover leaves the session parked in its current stage until the
//! link drops. Disconnection is the only cancellation signal, and it
//! discards the session whatever state it is in.

use crate::ble::discovery::{
    Action, DiscoverRequest, DiscoverySession, IterControl, Stage, SubscribeRequest, UuidChain,
};

/// Transport-assigned connection identifier. Opaque to the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnId(pub u16);

/// Why the link refused a request outright.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Transport cannot take another request right now.
    Busy,
    /// The request's handle window is not acceptable.
    InvalidRange,
    /// A subscription already exists for this handle.
    AlreadySubscribed,
    /// The connection is gone.
    NotConnected,
}

/// The discover/subscribe surface of the BLE host stack.
///
/// Both calls accept or reject the *request* immediately; matching
/// attributes arrive later, one at a time, through
/// [`Central::on_attribute_found`].
pub trait GattLink {
    fn discover(&mut self, conn: ConnId, request: &DiscoverRequest) -> Result<(), LinkError>;
    fn subscribe(&mut self, conn: ConnId, request: &SubscribeRequest) -> Result<(), LinkError>;
}

/// Result of delivering a connection event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectOutcome {
    /// Discovery started; the opening request is in flight.
    Discovering,
    /// A connection is already being tracked; this one was ignored.
    Ignored,
    /// The opening discovery request was rejected. The session is parked
    /// in `Idle` and nothing further happens until disconnect.
    Failed(LinkError),
}

/// Result of consuming one discovered attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttributeOutcome {
    /// The follow-up discovery request is in flight; the session is now
    /// in the carried stage.
    Advanced(Stage),
    /// The subscribe request was accepted, or the peer reported an
    /// existing subscription (idempotent re-subscribe).
    Subscribed { value_handle: u16 },
    /// The follow-up request was rejected; the session stays stalled in
    /// the already-committed stage.
    Stalled { stage: Stage, error: LinkError },
    /// The subscribe request failed for a real reason. Terminal all the
    /// same; the driver does not retry.
    SubscribeFailed { error: LinkError },
    /// Attribute for an untracked connection, a parked session, or a
    /// session that already finished.
    Ignored,
}

struct Tracked {
    conn: ConnId,
    session: DiscoverySession,
}

/// Central-role driver for exactly one tracked connection at a time.
pub struct Central<L: GattLink> {
    link: L,
    chain: UuidChain,
    tracked: Option<Tracked>,
}

impl<L: GattLink> Central<L> {
    pub fn new(link: L, chain: UuidChain) -> Self {
        Self {
            link,
            chain,
            tracked: None,
        }
    }

    /// The transport underneath, e.g. for shells that need to drive it
    /// outside the discovery flow.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Stage of the tracked session, `Idle` when nothing is tracked.
    pub fn stage(&self) -> Stage {
        self.tracked
            .as_ref()
            .map_or(Stage::Idle, |t| t.session.stage())
    }

    pub fn is_tracking(&self) -> bool {
        self.tracked.is_some()
    }

    /// A connection came up. The first connection is adopted and its
    /// discovery handshake starts; any further connection while one is
    /// tracked is ignored (single-central model).
    pub fn on_connected(&mut self, conn: ConnId) -> ConnectOutcome {
        if self.tracked.is_some() {
            return ConnectOutcome::Ignored;
        }

        let (mut session, request) = DiscoverySession::begin(self.chain);
        let outcome = match self.link.discover(conn, &request) {
            Ok(()) => ConnectOutcome::Discovering,
            Err(error) => {
                // Terminal for this connection's discovery attempt; the
                // session sits idle until disconnect clears it.
                session.park();
                ConnectOutcome::Failed(error)
            }
        };
        self.tracked = Some(Tracked { conn, session });
        outcome
    }

    /// One matching attribute from the in-flight discovery request.
    ///
    /// Returns the signal for the discovery engine (always `Stop` in this
    /// driver: one match per stage suffices) together with what happened,
    /// for the shell to log.
    pub fn on_attribute_found(
        &mut self,
        conn: ConnId,
        handle: u16,
    ) -> (IterControl, AttributeOutcome) {
        let Some(tracked) = self.tracked.as_mut() else {
            return (IterControl::Stop, AttributeOutcome::Ignored);
        };
        if tracked.conn != conn {
            return (IterControl::Stop, AttributeOutcome::Ignored);
        }

        let (control, action) = tracked.session.on_attribute_found(handle);
        let outcome = match action {
            None => AttributeOutcome::Ignored,
            Some(Action::Discover(request)) => match self.link.discover(conn, &request) {
                Ok(()) => AttributeOutcome::Advanced(tracked.session.stage()),
                Err(error) => AttributeOutcome::Stalled {
                    stage: tracked.session.stage(),
                    error,
                },
            },
            Some(Action::Subscribe(request)) => match self.link.subscribe(conn, &request) {
                Ok(()) | Err(LinkError::AlreadySubscribed) => AttributeOutcome::Subscribed {
                    value_handle: request.value_handle,
                },
                Err(error) => AttributeOutcome::SubscribeFailed { error },
            },
        };
        (control, outcome)
    }

    /// A notification arrived for a subscribed handle. Returns the payload
    /// to surface, or `None` for keep-alives (zero length) and traffic
    /// that is not ours.
    pub fn on_notification<'p>(&self, handle: u16, payload: &'p [u8]) -> Option<&'p [u8]> {
        let tracked = self.tracked.as_ref()?;
        if tracked.session.value_handle() != Some(handle) {
            return None;
        }
        if payload.is_empty() {
            // Keep-alive, not an error.
            return None;
        }
        Some(payload)
    }

    /// The link dropped. Discards the session unconditionally, whatever
    /// stage it was in. Returns `true` when it was the tracked connection,
    /// i.e. the caller should resume scanning.
    pub fn on_disconnected(&mut self, conn: ConnId) -> bool {
        match &self.tracked {
            Some(tracked) if tracked.conn == conn => {
                self.tracked = None;
                true
            }
            _ => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::discovery::DiscoverKind;

    const CHAIN: UuidChain = UuidChain {
        service: 0x180D,
        characteristic: 0x2A37,
        descriptor: 0x2902,
    };

    /// Records every request; can be told to refuse them.
    #[derive(Default)]
    struct RecordingLink {
        discovers: Vec<DiscoverRequest>,
        subscribes: Vec<SubscribeRequest>,
        /// Refuse discover requests once this many have been accepted.
        fail_discovers_after: Option<usize>,
        /// Error every subscribe attempt returns.
        subscribe_error: Option<LinkError>,
    }

    impl GattLink for RecordingLink {
        fn discover(&mut self, _conn: ConnId, request: &DiscoverRequest) -> Result<(), LinkError> {
            if let Some(limit) = self.fail_discovers_after {
                if self.discovers.len() >= limit {
                    return Err(LinkError::Busy);
                }
            }
            self.discovers.push(*request);
            Ok(())
        }

        fn subscribe(
            &mut self,
            _conn: ConnId,
            request: &SubscribeRequest,
        ) -> Result<(), LinkError> {
            self.subscribes.push(*request);
            match self.subscribe_error {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }

    fn central() -> Central<RecordingLink> {
        Central::new(RecordingLink::default(), CHAIN)
    }

    #[test]
    fn full_handshake_issues_three_discovers_and_one_subscribe() {
        let mut central = central();
        let conn = ConnId(1);

        assert_eq!(central.on_connected(conn), ConnectOutcome::Discovering);
        assert_eq!(central.stage(), Stage::DiscoverPrimaryService);

        let (control, outcome) = central.on_attribute_found(conn, 10);
        assert_eq!(control, IterControl::Stop);
        assert_eq!(outcome, AttributeOutcome::Advanced(Stage::DiscoverCharacteristic));

        let (_, outcome) = central.on_attribute_found(conn, 20);
        assert_eq!(
            outcome,
            AttributeOutcome::Advanced(Stage::DiscoverDescriptor { value_handle: 21 })
        );

        let (control, outcome) = central.on_attribute_found(conn, 30);
        assert_eq!(control, IterControl::Stop);
        assert_eq!(outcome, AttributeOutcome::Subscribed { value_handle: 21 });
        assert_eq!(central.stage(), Stage::Subscribed { value_handle: 21 });

        // Exactly three discovery requests with advancing windows, then
        // one subscribe against the CCC handle.
        let link = central.link();
        assert_eq!(link.discovers.len(), 3);
        assert_eq!(link.discovers[0].kind, DiscoverKind::PrimaryService);
        assert_eq!(link.discovers[0].uuid, 0x180D);
        assert_eq!(link.discovers[0].start_handle, 0x0001);
        assert_eq!(link.discovers[0].end_handle, 0xFFFF);
        assert_eq!(link.discovers[1].kind, DiscoverKind::Characteristic);
        assert_eq!(link.discovers[1].uuid, 0x2A37);
        assert_eq!(link.discovers[1].start_handle, 11);
        assert_eq!(link.discovers[2].kind, DiscoverKind::Descriptor);
        assert_eq!(link.discovers[2].uuid, 0x2902);
        assert_eq!(link.discovers[2].start_handle, 22);
        assert_eq!(
            link.subscribes,
            vec![SubscribeRequest {
                ccc_handle: 30,
                value_handle: 21,
                enable_notify: true,
            }]
        );
    }

    #[test]
    fn second_connection_is_ignored_while_tracking() {
        let mut central = central();
        assert_eq!(central.on_connected(ConnId(1)), ConnectOutcome::Discovering);
        assert_eq!(central.on_connected(ConnId(2)), ConnectOutcome::Ignored);

        // Attributes for the interloper do nothing.
        let (_, outcome) = central.on_attribute_found(ConnId(2), 10);
        assert_eq!(outcome, AttributeOutcome::Ignored);
        assert_eq!(central.stage(), Stage::DiscoverPrimaryService);
        assert_eq!(central.link().discovers.len(), 1);
    }

    #[test]
    fn rejected_opening_discover_parks_session_idle() {
        let mut central = Central::new(
            RecordingLink {
                fail_discovers_after: Some(0),
                ..Default::default()
            },
            CHAIN,
        );
        let conn = ConnId(1);

        assert_eq!(
            central.on_connected(conn),
            ConnectOutcome::Failed(LinkError::Busy)
        );
        assert_eq!(central.stage(), Stage::Idle);

        // No automatic progress, no retry.
        let (_, outcome) = central.on_attribute_found(conn, 10);
        assert_eq!(outcome, AttributeOutcome::Ignored);
        assert!(central.link().discovers.is_empty());

        // Disconnect still clears the parked session.
        assert!(central.on_disconnected(conn));
        assert!(!central.is_tracking());
    }

    #[test]
    fn rejected_followup_stalls_in_committed_stage() {
        let mut central = Central::new(
            RecordingLink {
                fail_discovers_after: Some(1),
                ..Default::default()
            },
            CHAIN,
        );
        let conn = ConnId(1);
        central.on_connected(conn);

        let (control, outcome) = central.on_attribute_found(conn, 10);
        assert_eq!(control, IterControl::Stop);
        assert_eq!(
            outcome,
            AttributeOutcome::Stalled {
                stage: Stage::DiscoverCharacteristic,
                error: LinkError::Busy,
            }
        );
        // Stage was committed before the request went out and stays put.
        assert_eq!(central.stage(), Stage::DiscoverCharacteristic);
    }

    #[test]
    fn disconnect_mid_discovery_allows_fresh_session() {
        let mut central = central();
        central.on_connected(ConnId(1));
        central.on_attribute_found(ConnId(1), 10);
        assert_eq!(central.stage(), Stage::DiscoverCharacteristic);

        // Untracked connection dropping changes nothing.
        assert!(!central.on_disconnected(ConnId(9)));
        assert!(central.is_tracking());

        assert!(central.on_disconnected(ConnId(1)));
        assert_eq!(central.stage(), Stage::Idle);

        // A later connection restarts from scratch with a full window.
        assert_eq!(central.on_connected(ConnId(2)), ConnectOutcome::Discovering);
        assert_eq!(central.stage(), Stage::DiscoverPrimaryService);
        let last = central.link().discovers.last().unwrap();
        assert_eq!(last.kind, DiscoverKind::PrimaryService);
        assert_eq!(last.start_handle, 0x0001);
        assert_eq!(last.end_handle, 0xFFFF);
    }

    #[test]
    fn already_subscribed_counts_as_success() {
        let mut central = Central::new(
            RecordingLink {
                subscribe_error: Some(LinkError::AlreadySubscribed),
                ..Default::default()
            },
            CHAIN,
        );
        let conn = ConnId(1);
        central.on_connected(conn);
        central.on_attribute_found(conn, 10);
        central.on_attribute_found(conn, 20);

        let (_, outcome) = central.on_attribute_found(conn, 30);
        assert_eq!(outcome, AttributeOutcome::Subscribed { value_handle: 21 });
        assert_eq!(central.stage(), Stage::Subscribed { value_handle: 21 });
    }

    #[test]
    fn other_subscribe_failure_is_reported_but_terminal() {
        let mut central = Central::new(
            RecordingLink {
                subscribe_error: Some(LinkError::Busy),
                ..Default::default()
            },
            CHAIN,
        );
        let conn = ConnId(1);
        central.on_connected(conn);
        central.on_attribute_found(conn, 10);
        central.on_attribute_found(conn, 20);

        let (control, outcome) = central.on_attribute_found(conn, 30);
        assert_eq!(control, IterControl::Stop);
        assert_eq!(
            outcome,
            AttributeOutcome::SubscribeFailed {
                error: LinkError::Busy,
            }
        );
        // Terminal regardless; exactly one subscribe attempt was made.
        assert_eq!(central.stage(), Stage::Subscribed { value_handle: 21 });
        assert_eq!(central.link().subscribes.len(), 1);
    }

    #[test]
    fn notifications_filtered_by_handle_and_length() {
        let mut central = central();
        let conn = ConnId(1);
        central.on_connected(conn);
        central.on_attribute_found(conn, 10);
        central.on_attribute_found(conn, 20);
        central.on_attribute_found(conn, 30);

        // Payload for the subscribed value handle is surfaced.
        assert_eq!(central.on_notification(21, &[0x00, 0x48]), Some(&[0x00, 0x48][..]));
        // Zero-length keep-alive is swallowed.
        assert_eq!(central.on_notification(21, &[]), None);
        // Unrelated handle is not ours.
        assert_eq!(central.on_notification(99, &[0x00, 0x48]), None);

        // After disconnect nothing is surfaced.
        central.on_disconnected(conn);
        assert_eq!(central.on_notification(21, &[0x00, 0x48]), None);
    }
}
