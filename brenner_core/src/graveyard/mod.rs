//! Falsification ledger
//!
//! A graveyard entry records how a hypothesis died and what its death
//! taught. Death metadata is fixed once written; only the successor links,
//! the epitaph and the learning notes may be amended later.

mod patterns;

pub use patterns::{
    analyze_failure_patterns, analyze_failure_patterns_with, calculate_graveyard_stats,
    calculate_graveyard_stats_with, DomainCount, FailurePattern, FailurePatternKind,
    GraveyardStats,
};

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{BrennerError, Result, ValidationReport};
use crate::hypothesis::{EvidenceEntry, HypothesisCard, HypothesisState, HypothesisWithLifecycle};
use crate::ids::{is_session_scoped_id, GRAVEYARD_PREFIX};
use crate::timestamp::is_timestamp_value;

pub use crate::ids::generate_graveyard_id;

/// Death summaries shorter than this are flagged
pub const MIN_DEATH_SUMMARY_CHARS: usize = 20;

/// How the hypothesis failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathType {
    /// A prediction it forbade was observed
    DirectFalsification,
    /// The effect is real but the proposed mechanism is not
    MechanismFailure,
    /// The effect shrank toward nothing under better measurement
    EffectSizeCollapse,
    /// A confound explains the data
    ConfoundExposed,
    /// No feasible test can distinguish it
    Unmeasurable,
    /// The question itself turned out to be malformed
    Dissolved,
}

impl DeathType {
    pub const ALL: [DeathType; 6] = [
        DeathType::DirectFalsification,
        DeathType::MechanismFailure,
        DeathType::EffectSizeCollapse,
        DeathType::ConfoundExposed,
        DeathType::Unmeasurable,
        DeathType::Dissolved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectFalsification => "direct_falsification",
            Self::MechanismFailure => "mechanism_failure",
            Self::EffectSizeCollapse => "effect_size_collapse",
            Self::ConfoundExposed => "confound_exposed",
            Self::Unmeasurable => "unmeasurable",
            Self::Dissolved => "dissolved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == value)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::DirectFalsification => "Direct Falsification",
            Self::MechanismFailure => "Mechanism Failure",
            Self::EffectSizeCollapse => "Effect Size Collapse",
            Self::ConfoundExposed => "Confound Exposed",
            Self::Unmeasurable => "Unmeasurable",
            Self::Dissolved => "Dissolved",
        }
    }
}

impl std::fmt::Display for DeathType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the failure taught
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FalsificationLearning {
    pub lessons_learned: Vec<String>,
    pub what_we_now_know: Vec<String>,
    pub open_questions: Vec<String>,
    pub next_steps: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FalsifiedHypothesis {
    /// `GY-{sessionId}-{seq:3}`
    pub id: String,
    pub session_id: String,
    pub hypothesis: HypothesisCard,
    pub killing_blow: EvidenceEntry,
    pub death_type: DeathType,
    pub death_summary: String,
    pub learning: FalsificationLearning,
    #[serde(default)]
    pub successor_hypothesis_ids: Vec<String>,
    #[serde(default)]
    pub contributed_to_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epitaph: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brenner_quote: Option<String>,
    #[serde(with = "crate::timestamp")]
    pub falsified_at: DateTime<Utc>,
}

impl FalsifiedHypothesis {
    pub fn has_epitaph(&self) -> bool {
        self.epitaph.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    pub fn has_successors(&self) -> bool {
        !self.successor_hypothesis_ids.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct FalsifiedHypothesisInput {
    pub session_id: String,
    pub sequence: u32,
    pub hypothesis: HypothesisCard,
    pub killing_blow: EvidenceEntry,
    pub death_type: DeathType,
    pub death_summary: String,
    pub learning: FalsificationLearning,
    pub successor_hypothesis_ids: Vec<String>,
    pub contributed_to_ids: Vec<String>,
    pub epitaph: Option<String>,
    pub brenner_quote: Option<String>,
}

/// Build a validated graveyard entry
///
/// # Errors
/// - `BrennerError::InvalidId` for a malformed session id or sequence
/// - `BrennerError::Validation` listing every blocking issue
pub fn create_falsified_hypothesis(input: FalsifiedHypothesisInput) -> Result<FalsifiedHypothesis> {
    let id = generate_graveyard_id(&input.session_id, input.sequence)?;
    let entry = FalsifiedHypothesis {
        id,
        session_id: input.session_id,
        hypothesis: input.hypothesis,
        killing_blow: input.killing_blow,
        death_type: input.death_type,
        death_summary: input.death_summary.trim().to_string(),
        learning: input.learning,
        successor_hypothesis_ids: input.successor_hypothesis_ids,
        contributed_to_ids: input.contributed_to_ids,
        epitaph: input.epitaph,
        brenner_quote: input.brenner_quote,
        falsified_at: Utc::now(),
    };

    validate_falsified_entry(&entry).into_result("graveyard entry")?;
    tracing::debug!(
        "Buried {} as {} ({})",
        entry.hypothesis.id,
        entry.id,
        entry.death_type
    );
    Ok(entry)
}

fn non_blank_str<'a>(doc: &'a Value, field: &str) -> Option<&'a str> {
    doc.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn is_empty_list(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_array)
        .map_or(true, |items| items.is_empty())
}

/// Validate an untyped graveyard document
///
/// Works on raw JSON so documents from storage or other writers can be
/// checked before they are decoded.
pub fn validate_falsified_hypothesis(doc: &Value) -> ValidationReport {
    let mut report = ValidationReport::new();
    if !doc.is_object() {
        report.error("entry", "must be an object");
        return report;
    }

    match non_blank_str(doc, "id") {
        None => report.error("id", "is required"),
        Some(id) if !is_session_scoped_id(GRAVEYARD_PREFIX, id) => {
            report.error("id", format!("{:?} is not a valid graveyard id", id))
        }
        Some(_) => {}
    }
    if non_blank_str(doc, "sessionId").is_none() {
        report.error("sessionId", "is required");
    }
    let death_summary = non_blank_str(doc, "deathSummary");
    if death_summary.is_none() {
        report.error("deathSummary", "is required");
    }
    let death_type = doc.get("deathType").and_then(Value::as_str).and_then(DeathType::parse);
    if death_type.is_none() {
        report.error(
            "deathType",
            format!(
                "must be one of {}",
                DeathType::ALL.map(DeathType::as_str).join(", ")
            ),
        );
    }
    if !doc.get("falsifiedAt").is_some_and(is_timestamp_value) {
        report.error("falsifiedAt", "must be a valid timestamp");
    }
    for field in ["hypothesis", "killingBlow", "learning"] {
        if !doc.get(field).is_some_and(Value::is_object) {
            report.error(field, "is required");
        }
    }

    if death_summary.is_some_and(|s| s.trim().chars().count() < MIN_DEATH_SUMMARY_CHARS) {
        report.warn(
            "deathSummary",
            "summary is very short; say what killed the hypothesis",
        );
    }
    if non_blank_str(doc, "epitaph").is_none() {
        report.warn("epitaph", "no epitaph written");
    }
    if is_empty_list(doc.get("learning").and_then(|l| l.get("lessonsLearned"))) {
        report.warn("learning.lessonsLearned", "no lessons recorded");
    }
    if death_type != Some(DeathType::Unmeasurable)
        && is_empty_list(doc.get("successorHypothesisIds"))
    {
        report.warn(
            "successorHypothesisIds",
            "no successor hypotheses; what replaces it?",
        );
    }

    report
}

/// Validate a typed entry with the same rules as the untyped form
pub fn validate_falsified_entry(entry: &FalsifiedHypothesis) -> ValidationReport {
    match serde_json::to_value(entry) {
        Ok(doc) => validate_falsified_hypothesis(&doc),
        Err(e) => {
            let mut report = ValidationReport::new();
            report.error("entry", format!("could not be encoded: {}", e));
            report
        }
    }
}

/// Validate then decode an untyped document
pub fn parse_falsified_hypothesis(doc: &Value) -> Result<FalsifiedHypothesis> {
    validate_falsified_hypothesis(doc).into_result("graveyard entry")?;
    Ok(serde_json::from_value(doc.clone())?)
}

fn with_link<'a>(
    entry: &'a FalsifiedHypothesis,
    hypothesis_id: &str,
    links: impl Fn(&mut FalsifiedHypothesis) -> &mut Vec<String>,
    current: &[String],
) -> Cow<'a, FalsifiedHypothesis> {
    if current.iter().any(|id| id == hypothesis_id) {
        return Cow::Borrowed(entry);
    }
    let mut next = entry.clone();
    links(&mut next).push(hypothesis_id.to_string());
    Cow::Owned(next)
}

/// Link a successor; a repeated id leaves the entry untouched
pub fn add_successor<'a>(
    entry: &'a FalsifiedHypothesis,
    hypothesis_id: &str,
) -> Cow<'a, FalsifiedHypothesis> {
    with_link(
        entry,
        hypothesis_id,
        |e| &mut e.successor_hypothesis_ids,
        &entry.successor_hypothesis_ids,
    )
}

/// Record a hypothesis this failure fed into; idempotent
pub fn add_contributed_to<'a>(
    entry: &'a FalsifiedHypothesis,
    hypothesis_id: &str,
) -> Cow<'a, FalsifiedHypothesis> {
    with_link(
        entry,
        hypothesis_id,
        |e| &mut e.contributed_to_ids,
        &entry.contributed_to_ids,
    )
}

/// Replace the epitaph; a blank one clears it
pub fn amend_epitaph(entry: &FalsifiedHypothesis, epitaph: &str) -> FalsifiedHypothesis {
    let mut next = entry.clone();
    let epitaph = epitaph.trim();
    next.epitaph = (!epitaph.is_empty()).then(|| epitaph.to_string());
    next
}

pub fn amend_learning(
    entry: &FalsifiedHypothesis,
    learning: FalsificationLearning,
) -> FalsifiedHypothesis {
    let mut next = entry.clone();
    next.learning = learning;
    next
}

/// Details supplied when burying a falsified lifecycle hypothesis
#[derive(Clone, Debug)]
pub struct Burial {
    pub sequence: u32,
    pub killing_blow: EvidenceEntry,
    pub death_type: DeathType,
    /// Falls back to the recorded falsification reason when blank
    pub death_summary: Option<String>,
    pub learning: FalsificationLearning,
    pub epitaph: Option<String>,
    pub brenner_quote: Option<String>,
}

/// Turn a falsified lifecycle hypothesis into a graveyard entry
pub fn bury_hypothesis(
    hypothesis: &HypothesisWithLifecycle,
    burial: Burial,
) -> Result<FalsifiedHypothesis> {
    if hypothesis.state != HypothesisState::Falsified {
        return Err(BrennerError::InvalidState(format!(
            "Only falsified hypotheses can be buried; {} is {}",
            hypothesis.id(),
            hypothesis.state
        )));
    }
    let death_summary = burial
        .death_summary
        .filter(|s| !s.trim().is_empty())
        .or_else(|| hypothesis.falsification_reason.clone())
        .unwrap_or_default();

    create_falsified_hypothesis(FalsifiedHypothesisInput {
        session_id: hypothesis.card.session_id.clone(),
        sequence: burial.sequence,
        hypothesis: hypothesis.card.clone(),
        killing_blow: burial.killing_blow,
        death_type: burial.death_type,
        death_summary,
        learning: burial.learning,
        successor_hypothesis_ids: Vec::new(),
        contributed_to_ids: Vec::new(),
        epitaph: burial.epitaph,
        brenner_quote: burial.brenner_quote,
    })
}
