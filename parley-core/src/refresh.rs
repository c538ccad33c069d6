// ABOUTME: Refresh scheduler - decides when the externally owned view is stale.
// ABOUTME: Pure Idle/Waiting state machine driven by the session actor's clock.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Signals buffered for a slow view. Extra signals are coalesced.
pub const REFRESH_BUFFER: usize = 16;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(2);

/// Refresh cadence policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub interval: Duration,
    /// Keep ticking while no connection is active
    pub while_disconnected: bool,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
            while_disconnected: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Waiting { deadline: Instant },
}

/// Why the view should re-read the session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSignal {
    Periodic,
    Manual,
}

pub struct RefreshScheduler {
    policy: RefreshPolicy,
    state: RefreshState,
}

impl RefreshScheduler {
    pub fn new(policy: RefreshPolicy) -> Self {
        Self {
            policy,
            state: RefreshState::Idle,
        }
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    pub fn state(&self) -> RefreshState {
        self.state
    }

    fn active(&self, connected: bool) -> bool {
        connected || self.policy.while_disconnected
    }

    /// Start waiting if idle and a period is active; go idle if it is not.
    pub fn arm(&mut self, connected: bool, now: Instant) {
        if !self.active(connected) {
            self.cancel();
            return;
        }
        if self.state == RefreshState::Idle {
            self.state = RefreshState::Waiting {
                deadline: now + self.policy.interval,
            };
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            RefreshState::Idle => None,
            RefreshState::Waiting { deadline } => Some(deadline),
        }
    }

    /// Fire the periodic signal once the deadline has passed
    pub fn poll_expired(&mut self, now: Instant) -> Option<RefreshSignal> {
        match self.state {
            RefreshState::Waiting { deadline } if deadline <= now => {
                self.state = RefreshState::Idle;
                Some(RefreshSignal::Periodic)
            }
            _ => None,
        }
    }

    /// Signal right away and restart the cadence
    pub fn manual(&mut self, connected: bool, now: Instant) -> RefreshSignal {
        self.state = RefreshState::Idle;
        self.arm(connected, now);
        RefreshSignal::Manual
    }

    pub fn cancel(&mut self) {
        self.state = RefreshState::Idle;
    }
}

/// View side of the refresh contract
#[derive(Debug)]
pub struct RefreshReceiver {
    rx: mpsc::Receiver<RefreshSignal>,
}

impl RefreshReceiver {
    pub fn new(rx: mpsc::Receiver<RefreshSignal>) -> Self {
        Self { rx }
    }

    /// Next signal, or None once the session is gone
    pub async fn recv(&mut self) -> Option<RefreshSignal> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<RefreshSignal> {
        self.rx.try_recv().ok()
    }
}
