//! The curation state machine.
//!
//! Named states with precondition-checked transitions replace menu-driven
//! control flow. The gating rules (canonical sequences before matching,
//! everything confirmed before finalizing) are enforced in one place and
//! testable without any terminal attached.

use crate::ops::error::Error;
use crate::ops::standard::StandardSequences;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurationState {
    /// Waiting for a reference structure to be designated.
    SelectingReference,
    /// Waiting for consensus sequences to be built from all inputs.
    BuildingConsensus,
    /// Canonical set frozen; assignments and concatenations in progress.
    ResolvingConflicts,
    /// All gates passed; output files may be written.
    Finalized,
}

impl fmt::Display for CurationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CurationState::SelectingReference => "selecting-reference",
            CurationState::BuildingConsensus => "building-consensus",
            CurationState::ResolvingConflicts => "resolving-conflicts",
            CurationState::Finalized => "finalized",
        };
        write!(f, "{name}")
    }
}

/// How the canonical set will be produced, which decides the start state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardSource {
    Reference,
    Consensus,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    state: CurationState,
}

impl Workflow {
    pub fn new(source: StandardSource) -> Self {
        let state = match source {
            StandardSource::Reference => CurationState::SelectingReference,
            StandardSource::Consensus => CurationState::BuildingConsensus,
        };
        Self { state }
    }

    pub fn state(&self) -> CurationState {
        self.state
    }

    /// Freezes the canonical set and moves on to conflict resolution.
    pub fn standards_ready(&mut self, standards: &StandardSequences) -> Result<(), Error> {
        match self.state {
            CurationState::SelectingReference | CurationState::BuildingConsensus => {
                if standards.is_empty() {
                    return Err(Error::EmptyStandardSet);
                }
                self.state = CurationState::ResolvingConflicts;
                Ok(())
            }
            _ => Err(self.invalid_transition(CurationState::ResolvingConflicts)),
        }
    }

    /// Passes the finalize gate: nothing may remain unconfirmed anywhere in
    /// the batch.
    pub fn finalize(&mut self, unconfirmed: usize) -> Result<(), Error> {
        match self.state {
            CurationState::ResolvingConflicts => {
                if unconfirmed > 0 {
                    return Err(Error::Incomplete { count: unconfirmed });
                }
                self.state = CurationState::Finalized;
                Ok(())
            }
            _ => Err(self.invalid_transition(CurationState::Finalized)),
        }
    }

    fn invalid_transition(&self, requested: CurationState) -> Error {
        Error::InvalidTransition {
            current: self.state.to_string(),
            requested: requested.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standards() -> StandardSequences {
        let mut set = StandardSequences::default();
        set.insert("A", "MKVLE");
        set
    }

    #[test]
    fn source_decides_start_state() {
        assert_eq!(
            Workflow::new(StandardSource::Reference).state(),
            CurationState::SelectingReference
        );
        assert_eq!(
            Workflow::new(StandardSource::Consensus).state(),
            CurationState::BuildingConsensus
        );
    }

    #[test]
    fn standards_ready_moves_to_resolving_conflicts() {
        let mut workflow = Workflow::new(StandardSource::Consensus);

        workflow.standards_ready(&standards()).unwrap();

        assert_eq!(workflow.state(), CurationState::ResolvingConflicts);
    }

    #[test]
    fn empty_standards_block_the_transition() {
        let mut workflow = Workflow::new(StandardSource::Reference);

        let err = workflow
            .standards_ready(&StandardSequences::default())
            .unwrap_err();

        assert!(matches!(err, Error::EmptyStandardSet));
        assert_eq!(workflow.state(), CurationState::SelectingReference);
    }

    #[test]
    fn finalize_requires_zero_unconfirmed_entries() {
        let mut workflow = Workflow::new(StandardSource::Consensus);
        workflow.standards_ready(&standards()).unwrap();

        let err = workflow.finalize(3).unwrap_err();
        assert!(matches!(err, Error::Incomplete { count: 3 }));
        assert_eq!(workflow.state(), CurationState::ResolvingConflicts);

        workflow.finalize(0).unwrap();
        assert_eq!(workflow.state(), CurationState::Finalized);
    }

    #[test]
    fn finalize_before_standards_is_an_invalid_transition() {
        let mut workflow = Workflow::new(StandardSource::Consensus);

        let err = workflow.finalize(0).unwrap_err();

        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn finalized_workflow_accepts_no_further_transitions() {
        let mut workflow = Workflow::new(StandardSource::Consensus);
        workflow.standards_ready(&standards()).unwrap();
        workflow.finalize(0).unwrap();

        assert!(workflow.standards_ready(&standards()).is_err());
        assert!(workflow.finalize(0).is_err());
    }
}
