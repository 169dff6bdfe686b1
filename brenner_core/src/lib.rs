//! Brenner Loop core
//!
//! Hypothesis lifecycle and evolution model for structured hypothesis
//! critique:
//! - Hypothesis cards: validated, versioned, falsifiable claims
//! - Evidence and confidence: heuristic updates from discriminating tests
//! - Lifecycle: guarded state machine from draft to falsified or superseded
//! - Evolution: version history with lineage queries
//! - Arena: rival hypotheses ranked against shared tests
//! - Graveyard: what each falsified hypothesis taught

// Module declarations
pub mod arena;
pub mod config;
pub mod errors;
pub mod evolution;
pub mod graveyard;
pub mod hypothesis;
pub mod ids;
pub mod timestamp;

// Re-export main types
pub use hypothesis::{
    compute_confidence_update, create_evidence_entry, create_hypothesis_card,
    evolve_hypothesis_card, transition_hypothesis, validate_hypothesis_card, EvidenceEntry,
    HypothesisCard, HypothesisState, HypothesisWithLifecycle, LifecycleEvent, PredictionBoldness,
    TestResult, TransitionError,
};

pub use evolution::{EvolutionTrigger, HypothesisHistoryStore, HypothesisVersion};

pub use arena::{ArenaStatus, HypothesisArena};

pub use graveyard::{DeathType, FalsifiedHypothesis};

pub use config::BrennerConfig;

pub use errors::{BrennerError, Result, ValidationIssue, ValidationReport};

/// Version of the core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core version; no subscriber is installed
pub fn init() {
    tracing::info!("Brenner Loop core v{}", VERSION);
}
