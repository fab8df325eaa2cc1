//! Session lifecycle state machine

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Coarse session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Never activated, or reset since the last talk spurt
    Idle,
    /// Receiving audio
    Active,
    /// Terminal
    Closed,
}

/// Activation, audibility and reset bookkeeping
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: LifecycleState,
    /// Set by a reset, cleared by the next accepted packet
    resetted: bool,
    audible: bool,
    last_activity: Option<Instant>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Idle,
            resetted: false,
            audible: false,
            last_activity: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active
    }

    pub fn is_closed(&self) -> bool {
        self.state == LifecycleState::Closed
    }

    pub fn is_audible(&self) -> bool {
        self.audible
    }

    pub fn is_resetted(&self) -> bool {
        self.resetted
    }

    /// A data packet went through
    pub fn activate(&mut self, now: Instant, audible: bool) {
        if self.is_closed() {
            return;
        }
        self.state = LifecycleState::Active;
        self.resetted = false;
        self.audible = audible;
        self.last_activity = Some(now);
    }

    /// Active, but silent for longer than `timeout` (zero disables)
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        if !self.is_active() || timeout.is_zero() {
            return false;
        }
        self.last_activity
            .map_or(false, |last| now.saturating_duration_since(last) > timeout)
    }

    /// Returns false when nothing changed (already reset or closed)
    pub fn reset(&mut self) -> bool {
        if self.is_closed() || self.resetted {
            return false;
        }
        self.resetted = true;
        self.state = LifecycleState::Idle;
        self.audible = false;
        true
    }

    /// Returns false when already closed
    pub fn close(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.state = LifecycleState::Closed;
        self.audible = false;
        true
    }
}

/// The delayed reset scheduled by an end packet
///
/// Each arm bumps the generation; a firing timer only counts if its
/// generation is still the pending one.
#[derive(Debug, Default)]
pub struct EndOfStreamTimer {
    generation: u64,
    pending: Option<(u64, JoinHandle<()>)>,
}

impl EndOfStreamTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any pending timer with one spawned by `spawn`
    pub fn arm(&mut self, spawn: impl FnOnce(u64) -> JoinHandle<()>) -> u64 {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        self.pending = Some((generation, spawn(generation)));
        generation
    }

    /// Returns true if a timer was pending
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Consume the pending timer if `generation` is current
    pub fn fire(&mut self, generation: u64) -> bool {
        match &self.pending {
            Some((pending, _)) if *pending == generation => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}
