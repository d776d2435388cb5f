//! One-shot latch between two pipeline stages.

use tokio::sync::watch;
use tracing::debug;

use crate::error::{Error, Result};

use super::Stage;

/// Where a gate currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// The guarded stage has not finished yet.
    Closed,
    /// The guarded stage finished successfully. Permanent.
    Open,
    /// The guarded stage failed. A later successful run may still open it.
    Failed,
    /// The session that owned the gate was replaced. Permanent.
    Abandoned,
}

/// Starts closed and is opened exactly once by the stage it guards. Any number
/// of waiters suspend until then and return immediately afterwards.
///
/// Unlike a bare latch, a gate also carries failure: waiters are woken when
/// the guarded stage fails or the session is reset instead of hanging.
#[derive(Debug)]
pub struct Gate {
    guards: Stage,
    state: watch::Sender<GateState>,
}

impl Gate {
    pub fn new(guards: Stage) -> Self {
        let (state, _) = watch::channel(GateState::Closed);
        Self { guards, state }
    }

    /// The stage whose completion this gate announces.
    pub fn guards(&self) -> Stage {
        self.guards
    }

    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == GateState::Open
    }

    /// Open the gate. Returns `false` when it was already open (or abandoned),
    /// in which case nothing changes.
    pub fn open(&self) -> bool {
        let opened = self.state.send_if_modified(|state| match state {
            GateState::Closed | GateState::Failed => {
                *state = GateState::Open;
                true
            }
            GateState::Open | GateState::Abandoned => false,
        });
        if opened {
            debug!(gate = %self.guards, "gate opened");
        }
        opened
    }

    /// Record that the guarded stage failed, waking current waiters.
    pub fn fail(&self) {
        let failed = self.state.send_if_modified(|state| {
            if *state == GateState::Closed {
                *state = GateState::Failed;
                true
            } else {
                false
            }
        });
        if failed {
            debug!(gate = %self.guards, "gate failed");
        }
    }

    /// Retire the gate with its session. Waiters that are not yet through are
    /// released with a cancellation; an open gate stays open.
    pub fn abandon(&self) {
        self.state.send_if_modified(|state| match state {
            GateState::Closed | GateState::Failed => {
                *state = GateState::Abandoned;
                true
            }
            GateState::Open | GateState::Abandoned => false,
        });
    }

    /// Suspend until the gate leaves [`GateState::Closed`] and report where it
    /// ended up.
    pub async fn settled(&self) -> GateState {
        let mut updates = self.state.subscribe();
        let settled = match updates.wait_for(|state| *state != GateState::Closed).await {
            Ok(state) => *state,
            Err(_) => GateState::Abandoned,
        };
        settled
    }

    /// Wait on behalf of `waiter` until the gate opens.
    pub async fn await_open(&self, waiter: Stage) -> Result<()> {
        match self.settled().await {
            GateState::Open => Ok(()),
            GateState::Failed => Err(Error::StageOrdering {
                stage: waiter,
                predecessor: self.guards,
            }),
            GateState::Closed | GateState::Abandoned => {
                Err(Error::StageCancelled { stage: waiter })
            }
        }
    }
}
