//! Booking flow state machine.
//!
//! This module lives in `core` (zero internal deps) so the phase table
//! can be used by both the orchestrator and any front-end that wants
//! to render phase-dependent UI.

use std::fmt;

/// Phase of one booking screen's lifecycle.
///
/// The happy path is `Idle -> Fetching -> Ready -> Locking ->
/// AwaitingBeneficiaryChoice -> Confirming -> Done -> Ready`. Every
/// intermediate phase has a failure edge back to `Ready`; a failed
/// initial connect falls back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingPhase {
    /// Screen not yet activated, or the initial connect failed.
    Idle,
    /// Loading the day's availability (initial fetch or day switch).
    Fetching,
    /// Live slot list on screen, no booking attempt in flight.
    Ready,
    /// A lock request for a selected slot is in flight.
    Locking,
    /// Hold acquired; waiting for the user to pick a beneficiary.
    AwaitingBeneficiaryChoice,
    /// A confirm request is in flight.
    Confirming,
    /// Booking succeeded. Transient; immediately returns to `Ready`.
    Done,
}

impl BookingPhase {
    /// Returns the set of phases reachable from `self`.
    pub fn valid_transitions(self) -> &'static [BookingPhase] {
        use BookingPhase::*;
        match self {
            Idle => &[Fetching],
            // Fetch failure stays Ready (empty list); a failed initial
            // connect falls back to Idle.
            Fetching => &[Ready, Idle],
            // Day switch re-enters Fetching.
            Ready => &[Locking, Fetching, Idle],
            Locking => &[AwaitingBeneficiaryChoice, Confirming, Ready],
            AwaitingBeneficiaryChoice => &[Confirming, Ready],
            Confirming => &[Done, Ready],
            Done => &[Ready],
        }
    }

    /// Check whether a transition from `self` to `to` is allowed.
    pub fn can_transition(self, to: BookingPhase) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate a transition, returning an error message for invalid ones.
    pub fn validate_transition(self, to: BookingPhase) -> Result<(), String> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(format!("invalid booking phase transition: {self} -> {to}"))
        }
    }
}

impl fmt::Display for BookingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookingPhase::Idle => "Idle",
            BookingPhase::Fetching => "Fetching",
            BookingPhase::Ready => "Ready",
            BookingPhase::Locking => "Locking",
            BookingPhase::AwaitingBeneficiaryChoice => "AwaitingBeneficiaryChoice",
            BookingPhase::Confirming => "Confirming",
            BookingPhase::Done => "Done",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::BookingPhase::*;

    // -----------------------------------------------------------------------
    // Happy path
    // -----------------------------------------------------------------------

    #[test]
    fn happy_path_is_fully_connected() {
        let path = [
            Idle,
            Fetching,
            Ready,
            Locking,
            AwaitingBeneficiaryChoice,
            Confirming,
            Done,
            Ready,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition(pair[1]),
                "expected {} -> {} to be valid",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn locking_may_skip_the_chooser() {
        // Empty related-person list: straight to Confirming.
        assert!(Locking.can_transition(Confirming));
    }

    // -----------------------------------------------------------------------
    // Failure edges
    // -----------------------------------------------------------------------

    #[test]
    fn every_intermediate_phase_can_fail_back_to_ready() {
        for phase in [Fetching, Locking, AwaitingBeneficiaryChoice, Confirming] {
            assert!(
                phase.can_transition(Ready),
                "expected {phase} -> Ready to be valid"
            );
        }
    }

    #[test]
    fn failed_initial_connect_falls_back_to_idle() {
        assert!(Fetching.can_transition(Idle));
    }

    // -----------------------------------------------------------------------
    // Invalid transitions
    // -----------------------------------------------------------------------

    #[test]
    fn idle_cannot_jump_to_locking() {
        assert!(!Idle.can_transition(Locking));
    }

    #[test]
    fn ready_cannot_jump_to_confirming() {
        assert!(!Ready.can_transition(Confirming));
    }

    #[test]
    fn done_only_returns_to_ready() {
        assert_eq!(Done.valid_transitions(), &[Ready]);
    }

    #[test]
    fn validate_transition_names_both_phases() {
        let err = Idle.validate_transition(Confirming).unwrap_err();
        assert!(err.contains("Idle"));
        assert!(err.contains("Confirming"));
    }
}
