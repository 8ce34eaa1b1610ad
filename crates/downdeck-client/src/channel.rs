//! Push-channel lifecycle as an explicit state machine.
//!
//! The machine owns no sockets and no timers; it maps events to states and
//! returns the side effects the caller must perform. That keeps the
//! reconnect/backoff logic testable without a network — the async driver in
//! [`crate::runtime`] is the one interpreter of these effects.

use std::time::Duration;

/// Delay before retrying after a failed connect attempt.
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);
/// Delay before reconnecting after an unexpected close of a live channel.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
            ChannelState::Error => "error",
        }
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// An explicit connect request from the application. Idempotent while
    /// already connecting or connected.
    ConnectRequested,
    /// The transport reported a successful connection.
    TransportOpen,
    /// The transport failed to connect, with a human-readable reason.
    ConnectFailed(String),
    /// A live connection closed unexpectedly.
    TransportClosed,
    /// The pending retry timer fired.
    RetryElapsed,
    /// Application teardown; cancels any pending retry.
    Teardown,
}

/// Side effects the caller must perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open the transport connection.
    OpenTransport,
    /// Re-establish the progress subscription, then trigger an immediate
    /// full snapshot reload to resynchronize anything missed while offline.
    Resubscribe,
    /// Arm the single retry timer for the given delay.
    ScheduleRetry(Duration),
    /// Disarm the pending retry timer.
    CancelRetry,
}

#[derive(Debug)]
pub struct ChannelMachine {
    state: ChannelState,
    retry_pending: bool,
    connect_retry_delay: Duration,
    reconnect_delay: Duration,
    batches_seen: u64,
    last_error: Option<String>,
}

impl Default for ChannelMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelMachine {
    pub fn new() -> Self {
        Self::with_delays(CONNECT_RETRY_DELAY, RECONNECT_DELAY)
    }

    pub fn with_delays(connect_retry_delay: Duration, reconnect_delay: Duration) -> Self {
        Self {
            state: ChannelState::Disconnected,
            retry_pending: false,
            connect_retry_delay,
            reconnect_delay,
            batches_seen: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// True while exactly one retry timer is armed; there is never more
    /// than one.
    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    /// Progress batches received since the machine was created; feeds the
    /// connection-status indicator.
    pub fn batches_seen(&self) -> u64 {
        self.batches_seen
    }

    /// The most recent connect failure reason, cleared on a successful
    /// open. Surfaced as a status indicator, never as a blocking error.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn note_batch(&mut self) {
        self.batches_seen += 1;
    }

    /// Apply one event; returns the effects the caller must perform, in
    /// order.
    pub fn handle(&mut self, event: ChannelEvent) -> Vec<Effect> {
        match event {
            ChannelEvent::ConnectRequested => match self.state {
                ChannelState::Connecting | ChannelState::Connected => Vec::new(),
                ChannelState::Disconnected | ChannelState::Error => {
                    if self.retry_pending {
                        // A retry timer is already armed; let it drive.
                        return Vec::new();
                    }
                    self.state = ChannelState::Connecting;
                    vec![Effect::OpenTransport]
                }
            },
            ChannelEvent::TransportOpen => match self.state {
                ChannelState::Connecting => {
                    self.state = ChannelState::Connected;
                    self.last_error = None;
                    vec![Effect::Resubscribe]
                }
                _ => Vec::new(),
            },
            ChannelEvent::ConnectFailed(reason) => match self.state {
                ChannelState::Connecting => {
                    self.state = ChannelState::Error;
                    self.last_error = Some(reason);
                    self.schedule_retry(self.connect_retry_delay)
                }
                _ => Vec::new(),
            },
            ChannelEvent::TransportClosed => match self.state {
                ChannelState::Connected => {
                    self.state = ChannelState::Disconnected;
                    self.schedule_retry(self.reconnect_delay)
                }
                ChannelState::Connecting => {
                    // Closed before the handshake finished counts as a
                    // failed connect.
                    self.state = ChannelState::Error;
                    self.schedule_retry(self.connect_retry_delay)
                }
                _ => Vec::new(),
            },
            ChannelEvent::RetryElapsed => {
                self.retry_pending = false;
                match self.state {
                    ChannelState::Disconnected | ChannelState::Error => {
                        self.state = ChannelState::Connecting;
                        vec![Effect::OpenTransport]
                    }
                    _ => Vec::new(),
                }
            }
            ChannelEvent::Teardown => {
                self.state = ChannelState::Disconnected;
                if self.retry_pending {
                    self.retry_pending = false;
                    vec![Effect::CancelRetry]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn schedule_retry(&mut self, delay: Duration) -> Vec<Effect> {
        if self.retry_pending {
            return Vec::new();
        }
        self.retry_pending = true;
        vec![Effect::ScheduleRetry(delay)]
    }
}
