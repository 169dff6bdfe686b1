//! Evidence entries: one recorded test outcome against a hypothesis version
//!
//! Entries are immutable once created. Graveyard records reference an entry
//! as the killing blow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EvidenceConfig;
use crate::errors::{Result, ValidationReport};
use crate::ids::{is_session_scoped_id, EVIDENCE_PREFIX};

use super::confidence::{DiscriminatingTest, MAX_DISCRIMINATIVE_POWER};

pub use crate::ids::generate_evidence_id;

/// Kind of test that produced the evidence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    /// Controlled intervention
    Experiment,
    /// Passive measurement
    Observation,
    /// Nature performed the intervention
    NaturalExperiment,
    /// Simulation or model run
    Computational,
    /// Published result
    Literature,
    /// Reasoning from established premises
    ThoughtExperiment,
}

impl TestType {
    pub const ALL: [TestType; 6] = [
        TestType::Experiment,
        TestType::Observation,
        TestType::NaturalExperiment,
        TestType::Computational,
        TestType::Literature,
        TestType::ThoughtExperiment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Experiment => "experiment",
            Self::Observation => "observation",
            Self::NaturalExperiment => "natural_experiment",
            Self::Computational => "computational",
            Self::Literature => "literature",
            Self::ThoughtExperiment => "thought_experiment",
        }
    }
}

impl std::fmt::Display for TestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a test relative to the hypothesis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestResult {
    Supports,
    Challenges,
    Eliminates,
    #[serde(alias = "neutral")]
    Inconclusive,
}

impl TestResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Supports => "supports",
            Self::Challenges => "challenges",
            Self::Eliminates => "eliminates",
            Self::Inconclusive => "inconclusive",
        }
    }

    pub fn is_disconfirming(self) -> bool {
        matches!(self, Self::Challenges | Self::Eliminates)
    }
}

impl std::fmt::Display for TestResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The discriminating test that was run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDescription {
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub test_type: TestType,
    /// 1 (barely distinguishes alternatives) to 5 (decisive)
    pub discriminative_power: u8,
}

impl DiscriminatingTest for TestDescription {
    fn discriminative_power(&self) -> u8 {
        self.discriminative_power
    }
}

/// One recorded test result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceEntry {
    /// `EV-{sessionId}-{seq:3}`
    pub id: String,
    pub session_id: String,
    /// Id of the hypothesis card version that was tested
    pub hypothesis_version: String,
    pub test: TestDescription,
    pub prediction_if_true: String,
    pub prediction_if_false: String,
    pub observation: String,
    pub result: TestResult,
    pub confidence_before: f64,
    pub confidence_after: f64,
    pub interpretation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(with = "crate::timestamp")]
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_by: Option<String>,
}

impl EvidenceEntry {
    pub fn confidence_delta(&self) -> f64 {
        self.confidence_after - self.confidence_before
    }

    pub fn is_disconfirming(&self) -> bool {
        self.result.is_disconfirming()
    }
}

/// Fields supplied when recording a test outcome
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceEntryInput {
    pub session_id: String,
    pub sequence: u32,
    pub hypothesis_version: String,
    pub test: TestDescription,
    pub prediction_if_true: String,
    pub prediction_if_false: String,
    pub observation: String,
    pub result: TestResult,
    pub confidence_before: f64,
    pub confidence_after: f64,
    pub interpretation: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub recorded_by: Option<String>,
}

/// Build a validated evidence entry
///
/// # Errors
/// - `BrennerError::InvalidId` for a malformed session id or sequence
/// - `BrennerError::Validation` listing every blocking issue
pub fn create_evidence_entry(input: EvidenceEntryInput) -> Result<EvidenceEntry> {
    let id = generate_evidence_id(&input.session_id, input.sequence)?;
    let entry = EvidenceEntry {
        id,
        session_id: input.session_id,
        hypothesis_version: input.hypothesis_version,
        test: input.test,
        prediction_if_true: input.prediction_if_true,
        prediction_if_false: input.prediction_if_false,
        observation: input.observation,
        result: input.result,
        confidence_before: input.confidence_before,
        confidence_after: input.confidence_after,
        interpretation: input.interpretation,
        source: input.source,
        notes: input.notes,
        recorded_at: Utc::now(),
        recorded_by: input.recorded_by,
    };

    validate_evidence_entry(&entry).into_result("evidence entry")?;
    tracing::debug!(
        "Recorded evidence {} against {} ({})",
        entry.id,
        entry.hypothesis_version,
        entry.result
    );
    Ok(entry)
}

/// Validate with default hygiene thresholds
pub fn validate_evidence_entry(entry: &EvidenceEntry) -> ValidationReport {
    validate_evidence_entry_with(entry, &EvidenceConfig::default())
}

pub fn validate_evidence_entry_with(
    entry: &EvidenceEntry,
    config: &EvidenceConfig,
) -> ValidationReport {
    let mut report = ValidationReport::new();

    if !is_session_scoped_id(EVIDENCE_PREFIX, &entry.id) {
        report.error("id", format!("{:?} is not a valid evidence id", entry.id));
    }
    if entry.hypothesis_version.trim().is_empty() {
        report.error("hypothesisVersion", "is required");
    }
    for (field, value) in [
        ("predictionIfTrue", &entry.prediction_if_true),
        ("predictionIfFalse", &entry.prediction_if_false),
        ("observation", &entry.observation),
        ("interpretation", &entry.interpretation),
        ("test.description", &entry.test.description),
    ] {
        if value.trim().is_empty() {
            report.error(field, "is required");
        }
    }
    if !(1..=MAX_DISCRIMINATIVE_POWER).contains(&entry.test.discriminative_power) {
        report.error("test.discriminativePower", "must be between 1 and 5");
    }
    for (field, value) in [
        ("confidenceBefore", entry.confidence_before),
        ("confidenceAfter", entry.confidence_after),
    ] {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            report.error(field, "must be between 0 and 100");
        }
    }

    if entry.test.discriminative_power < config.low_power_threshold {
        report.warn(
            "test.discriminativePower",
            "low discriminative power; this test barely separates the alternatives",
        );
    }
    if entry.source.as_deref().map_or(true, |s| s.trim().is_empty()) {
        report.warn("source", "no source recorded for this evidence");
    }
    if entry.confidence_delta().abs() < config.weak_delta_threshold {
        report.warn(
            "confidenceAfter",
            "confidence barely moved; this may be weak evidence",
        );
    }

    report
}
