//! Version history of hypotheses
//!
//! Every evolution of a card is recorded as a new node whose parent is the
//! version it was derived from. Old versions stay in the store; only the set
//! of `current` ids moves forward.

mod diff;
mod store;
mod views;

pub use diff::{diff_hypotheses, ChangeType, FieldChange};
pub use store::{Evolution, HypothesisHistoryStore};
pub use views::{
    generate_evolution_graph, generate_lineage_graph, get_evolution_stats, EvolutionEdge,
    EvolutionGraph, EvolutionNode, EvolutionStats, VersionStatus,
};

use serde::{Deserialize, Serialize};

use crate::hypothesis::HypothesisCard;

/// What prompted a new version
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionTrigger {
    Manual,
    /// Split into claims at different levels of explanation
    LevelSplit,
    /// An exclusion test ruled part of it out
    ExclusionTest,
    /// Same mechanism tried on a different object
    ObjectTranspose,
    /// Checked whether the effect survives a change of scale
    ScaleCheck,
    Evidence,
    AgentFeedback,
    Refinement,
}

impl EvolutionTrigger {
    pub const ALL: [EvolutionTrigger; 8] = [
        EvolutionTrigger::Manual,
        EvolutionTrigger::LevelSplit,
        EvolutionTrigger::ExclusionTest,
        EvolutionTrigger::ObjectTranspose,
        EvolutionTrigger::ScaleCheck,
        EvolutionTrigger::Evidence,
        EvolutionTrigger::AgentFeedback,
        EvolutionTrigger::Refinement,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::LevelSplit => "level_split",
            Self::ExclusionTest => "exclusion_test",
            Self::ObjectTranspose => "object_transpose",
            Self::ScaleCheck => "scale_check",
            Self::Evidence => "evidence",
            Self::AgentFeedback => "agent_feedback",
            Self::Refinement => "refinement",
        }
    }
}

impl std::fmt::Display for EvolutionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of the history graph
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HypothesisVersion {
    pub hypothesis: HypothesisCard,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Maintained by the store; always the ids whose `parent_id` is this node
    #[serde(default)]
    pub children: Vec<String>,
    pub trigger: EvolutionTrigger,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Evidence, arena test or agent message that prompted the change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_entity_id: Option<String>,
}

impl HypothesisVersion {
    pub fn id(&self) -> &str {
        &self.hypothesis.id
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
