//! Bootstrap phase state machine.
//!
//! `Idle → Probing → Instantiating → (PoolInit)? → Invoking → Ready`
//!
//! `Instantiating`, `PoolInit` and `Invoking` may fail into `Failed`.
//! `Ready` and `Failed` are terminal; there is no recovery transition.

use serde::Serialize;

/// Phase of a bootstrap run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootPhase {
    /// Nothing has happened yet.
    Idle,
    /// Host capability probe.
    Probing,
    /// Module load and instantiation.
    Instantiating,
    /// Worker pool start and pool-init call.
    PoolInit,
    /// Entry point invocation.
    Invoking,
    /// Module is running; no further mutation.
    Ready,
    /// Terminal failure.
    Failed,
}

impl BootPhase {
    /// True for `Ready` and `Failed`.
    pub const fn is_terminal(self) -> bool {
        matches!(self, BootPhase::Ready | BootPhase::Failed)
    }
}

/// Event driving a phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootEvent {
    /// Start the capability probe.
    Probe,
    /// Probe done; begin instantiation.
    Instantiate,
    /// Instantiation done; start the worker pool.
    StartPool,
    /// Previous phase done; invoke the entry point.
    Invoke,
    /// Entry point handled.
    Complete,
    /// Current phase failed.
    Fail,
}

/// Result of a transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition succeeded, with the new phase.
    Ok(BootPhase),
    /// Transition rejected, with the reason.
    Rejected(&'static str),
}

/// Current phase plus the history of phases entered.
#[derive(Debug, Clone)]
pub struct BootStateMachine {
    phase: BootPhase,
    history: Vec<BootPhase>,
}

impl BootStateMachine {
    /// New state machine in `Idle`.
    pub fn new() -> Self {
        Self {
            phase: BootPhase::Idle,
            history: vec![BootPhase::Idle],
        }
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> BootPhase {
        self.phase
    }

    /// Every phase entered so far, in order, starting with `Idle`.
    pub fn history(&self) -> &[BootPhase] {
        &self.history
    }

    /// Attempt a transition.
    pub fn handle_event(&mut self, event: BootEvent) -> TransitionResult {
        use BootEvent::*;
        use BootPhase::*;

        let next = match (self.phase, event) {
            (Idle, Probe) => Probing,
            (Probing, Instantiate) => Instantiating,
            (Instantiating, StartPool) => PoolInit,
            (Instantiating | PoolInit, Invoke) => Invoking,
            (Invoking, Complete) => Ready,
            (Instantiating | PoolInit | Invoking, Fail) => Failed,
            (Ready | Failed, _) => return TransitionResult::Rejected("bootstrap already finished"),
            (_, Fail) => return TransitionResult::Rejected("phase cannot fail"),
            _ => return TransitionResult::Rejected("phases must run in order"),
        };

        self.phase = next;
        self.history.push(next);
        TransitionResult::Ok(next)
    }
}

impl Default for BootStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(events: &[BootEvent]) -> BootStateMachine {
        let mut sm = BootStateMachine::new();
        for event in events {
            assert!(
                matches!(sm.handle_event(*event), TransitionResult::Ok(_)),
                "{event:?} rejected in {:?}",
                sm.phase()
            );
        }
        sm
    }

    #[test]
    fn full_sequence_with_pool() {
        let sm = drive(&[
            BootEvent::Probe,
            BootEvent::Instantiate,
            BootEvent::StartPool,
            BootEvent::Invoke,
            BootEvent::Complete,
        ]);
        assert_eq!(
            sm.history(),
            &[
                BootPhase::Idle,
                BootPhase::Probing,
                BootPhase::Instantiating,
                BootPhase::PoolInit,
                BootPhase::Invoking,
                BootPhase::Ready
            ]
        );
        assert!(sm.phase().is_terminal());
    }

    #[test]
    fn pool_init_is_optional() {
        let sm = drive(&[
            BootEvent::Probe,
            BootEvent::Instantiate,
            BootEvent::Invoke,
            BootEvent::Complete,
        ]);
        assert_eq!(sm.phase(), BootPhase::Ready);
        assert!(!sm.history().contains(&BootPhase::PoolInit));
    }

    #[test]
    fn instantiation_failure_is_terminal() {
        let mut sm = drive(&[BootEvent::Probe, BootEvent::Instantiate, BootEvent::Fail]);
        assert_eq!(sm.phase(), BootPhase::Failed);
        assert_eq!(
            sm.handle_event(BootEvent::Invoke),
            TransitionResult::Rejected("bootstrap already finished")
        );
        assert_eq!(sm.phase(), BootPhase::Failed);
    }

    #[test]
    fn invoke_before_instantiation_rejected() {
        let mut sm = drive(&[BootEvent::Probe]);
        assert!(matches!(
            sm.handle_event(BootEvent::Invoke),
            TransitionResult::Rejected(_)
        ));
        assert!(matches!(
            sm.handle_event(BootEvent::StartPool),
            TransitionResult::Rejected(_)
        ));
    }

    #[test]
    fn probe_cannot_fail() {
        let mut sm = drive(&[BootEvent::Probe]);
        assert_eq!(
            sm.handle_event(BootEvent::Fail),
            TransitionResult::Rejected("phase cannot fail")
        );
    }
}
