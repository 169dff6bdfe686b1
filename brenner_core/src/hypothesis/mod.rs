//! Hypothesis cards, evidence and lifecycle
//!
//! Cards are validated on construction and versioned on evolution. Evidence
//! entries record one test outcome each, and the confidence engine turns an
//! outcome into a heuristic confidence movement. The lifecycle module wraps a
//! card in a guarded state machine.

pub mod card;
pub mod confidence;
pub mod evidence;
pub mod lifecycle;

// Public exports
pub use card::{
    calculate_falsifiability_score, calculate_specificity_score, create_hypothesis_card,
    evolve_hypothesis_card, is_generic_mechanism, parse_hypothesis_card, validate_hypothesis_card,
    HypothesisCard, HypothesisCardChanges, HypothesisCardInput, IdentifiedConfound,
};
pub use confidence::{
    assess_prediction_boldness, compute_batch_confidence_update, compute_confidence_update,
    compute_confidence_update_with_boldness, BatchConfidenceUpdate, ConfidenceUpdate,
    DiscriminatingTest, PredictionBoldness, ResultCounts, TestPower,
};
pub use evidence::{
    create_evidence_entry, generate_evidence_id, validate_evidence_entry, EvidenceEntry,
    EvidenceEntryInput, TestDescription, TestResult, TestType,
};
pub use lifecycle::{
    can_transition, can_transition_with_event, get_available_transitions, is_resolvable,
    is_terminal_state, should_be_dormant, transition_hypothesis, transition_hypothesis_at,
    transition_hypothesis_json, HypothesisState, HypothesisWithLifecycle, LifecycleEvent,
    LifecycleEventType, SideEffect, TransitionError, TransitionResult, TransitionSuccess,
};
