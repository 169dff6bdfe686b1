//! Hypothesis card model
//!
//! A card is immutable per version: evolution produces a new card with a new
//! id and a `parent_version` link instead of editing the old one. Every card
//! must name at least one observation that would be impossible if the
//! hypothesis were true.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{BrennerError, Result, ValidationReport};
use crate::ids::{generate_hypothesis_card_id, parse_hypothesis_card_id};

use super::confidence::{assess_prediction_boldness, PredictionBoldness};

pub const STATEMENT_MIN_CHARS: usize = 10;
pub const STATEMENT_MAX_CHARS: usize = 1000;
pub const MECHANISM_MIN_CHARS: usize = 10;
pub const MECHANISM_MAX_CHARS: usize = 500;
pub const DEFAULT_CONFIDENCE: f64 = 50.0;

/// A named alternative explanation for the predicted observations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifiedConfound {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Estimated probability that the confound explains the data, 0.0 to 1.0
    pub likelihood: f64,
    #[serde(default)]
    pub addressed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl IdentifiedConfound {
    pub fn new(name: impl Into<String>, description: impl Into<String>, likelihood: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            likelihood,
            addressed: false,
            domain: None,
        }
    }

    pub fn addressed(mut self) -> Self {
        self.addressed = true;
        self
    }
}

/// One version of a hypothesis with its discriminative structure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HypothesisCard {
    /// `HC-{sessionId}-{seq:3}-v{version}`
    pub id: String,
    pub session_id: String,
    pub version: u32,
    pub statement: String,
    pub mechanism: String,
    #[serde(default)]
    pub domain: Vec<String>,
    pub predictions_if_true: Vec<String>,
    #[serde(default)]
    pub predictions_if_false: Vec<String>,
    /// Observations that would falsify the hypothesis
    pub impossible_if_true: Vec<String>,
    #[serde(default)]
    pub confounds: Vec<IdentifiedConfound>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    /// 0 to 100
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evolution_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl HypothesisCard {
    /// Predictions in lock-index order: if-true first, then if-false
    pub fn all_predictions(&self) -> impl Iterator<Item = &String> {
        self.predictions_if_true
            .iter()
            .chain(self.predictions_if_false.iter())
    }

    pub fn prediction_count(&self) -> usize {
        self.predictions_if_true.len() + self.predictions_if_false.len()
    }

    pub fn unaddressed_confounds(&self) -> impl Iterator<Item = &IdentifiedConfound> {
        self.confounds.iter().filter(|c| !c.addressed)
    }
}

/// Field values collected by a session, before id generation and validation
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HypothesisCardInput {
    pub session_id: String,
    pub sequence: u32,
    pub statement: String,
    pub mechanism: String,
    pub domain: Vec<String>,
    pub predictions_if_true: Vec<String>,
    pub predictions_if_false: Vec<String>,
    pub impossible_if_true: Vec<String>,
    pub confounds: Vec<IdentifiedConfound>,
    pub assumptions: Vec<String>,
    /// Defaults to 50 when omitted
    pub confidence: Option<f64>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

/// Field replacements applied when evolving a card; `None` keeps the old value
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HypothesisCardChanges {
    pub statement: Option<String>,
    pub mechanism: Option<String>,
    pub domain: Option<Vec<String>>,
    pub predictions_if_true: Option<Vec<String>>,
    pub predictions_if_false: Option<Vec<String>>,
    pub impossible_if_true: Option<Vec<String>>,
    pub confounds: Option<Vec<IdentifiedConfound>>,
    pub assumptions: Option<Vec<String>>,
    pub confidence: Option<f64>,
    pub notes: Option<String>,
}

impl HypothesisCardChanges {
    pub fn is_empty(&self) -> bool {
        self.statement.is_none()
            && self.mechanism.is_none()
            && self.domain.is_none()
            && self.predictions_if_true.is_none()
            && self.predictions_if_false.is_none()
            && self.impossible_if_true.is_none()
            && self.confounds.is_none()
            && self.assumptions.is_none()
            && self.confidence.is_none()
            && self.notes.is_none()
    }
}

/// Build a validated version-1 card
///
/// # Errors
/// - `BrennerError::InvalidId` for a malformed session id or sequence
/// - `BrennerError::Validation` listing every blocking issue
pub fn create_hypothesis_card(input: HypothesisCardInput) -> Result<HypothesisCard> {
    let id = generate_hypothesis_card_id(&input.session_id, input.sequence, 1)?;
    let now = Utc::now();
    let card = HypothesisCard {
        id,
        session_id: input.session_id,
        version: 1,
        statement: input.statement,
        mechanism: input.mechanism,
        domain: input.domain,
        predictions_if_true: input.predictions_if_true,
        predictions_if_false: input.predictions_if_false,
        impossible_if_true: input.impossible_if_true,
        confounds: input.confounds,
        assumptions: input.assumptions,
        confidence: input.confidence.unwrap_or(DEFAULT_CONFIDENCE),
        parent_version: None,
        evolution_reason: None,
        notes: input.notes,
        created_by: input.created_by,
        created_at: now,
        updated_at: now,
    };

    let warnings = validate_hypothesis_card(&card).into_result("hypothesis card")?;
    tracing::debug!(
        "Created hypothesis card {} ({} warnings)",
        card.id,
        warnings.len()
    );
    Ok(card)
}

/// Produce the next version of a card
///
/// The new id is derived from the parsed base of `current.id`, not from the
/// session and sequence fields.
pub fn evolve_hypothesis_card(
    current: &HypothesisCard,
    changes: HypothesisCardChanges,
    reason: &str,
    created_by: Option<&str>,
) -> Result<HypothesisCard> {
    let parts = parse_hypothesis_card_id(&current.id)?;
    let version = parts.version.checked_add(1).ok_or_else(|| {
        BrennerError::InvalidId(format!("No version after {}", current.id))
    })?;
    evolve_to_version(current, changes, reason, created_by, version)
}

/// Evolve into an explicit version number; used when a parent branches
pub(crate) fn evolve_to_version(
    current: &HypothesisCard,
    changes: HypothesisCardChanges,
    reason: &str,
    created_by: Option<&str>,
    version: u32,
) -> Result<HypothesisCard> {
    let parts = parse_hypothesis_card_id(&current.id)?;
    let now = Utc::now();

    let mut next = current.clone();
    next.id = parts.with_version(version);
    next.version = version;
    next.parent_version = Some(current.id.clone());
    next.evolution_reason = Some(reason.trim().to_string());
    next.created_by = created_by.map(str::to_string).or_else(|| current.created_by.clone());
    next.created_at = now;
    next.updated_at = now;

    let HypothesisCardChanges {
        statement,
        mechanism,
        domain,
        predictions_if_true,
        predictions_if_false,
        impossible_if_true,
        confounds,
        assumptions,
        confidence,
        notes,
    } = changes;
    if let Some(v) = statement {
        next.statement = v;
    }
    if let Some(v) = mechanism {
        next.mechanism = v;
    }
    if let Some(v) = domain {
        next.domain = v;
    }
    if let Some(v) = predictions_if_true {
        next.predictions_if_true = v;
    }
    if let Some(v) = predictions_if_false {
        next.predictions_if_false = v;
    }
    if let Some(v) = impossible_if_true {
        next.impossible_if_true = v;
    }
    if let Some(v) = confounds {
        next.confounds = v;
    }
    if let Some(v) = assumptions {
        next.assumptions = v;
    }
    if let Some(v) = confidence {
        next.confidence = v;
    }
    if notes.is_some() {
        next.notes = notes;
    }

    let mut report = validate_hypothesis_card(&next);
    if reason.trim().is_empty() {
        report.error("evolutionReason", "is required when evolving a hypothesis");
    }
    report.into_result("evolved hypothesis card")?;

    tracing::debug!("Evolved hypothesis card {} -> {}", current.id, next.id);
    Ok(next)
}

/// Parse an untyped document into a validated card
pub fn parse_hypothesis_card(value: &serde_json::Value) -> Result<HypothesisCard> {
    let card: HypothesisCard = serde_json::from_value(value.clone())?;
    validate_hypothesis_card(&card).into_result("hypothesis card")?;
    Ok(card)
}

fn generic_mechanism_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"(?i)^causes? ",
            r"(?i)^leads? to ",
            r"(?i)^affects? ",
            r"(?i)^is related to",
        ])
        .expect("static regex set")
    })
}

/// True when the mechanism text only restates that something causes something
pub fn is_generic_mechanism(mechanism: &str) -> bool {
    generic_mechanism_patterns().is_match(mechanism.trim())
}

fn check_text_length(
    report: &mut ValidationReport,
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.trim().chars().count();
    if len == 0 {
        report.error(field, "is required");
    } else if len < min {
        report.error(field, format!("must be at least {} characters", min));
    } else if len > max {
        report.error(field, format!("must be at most {} characters", max));
    }
}

fn check_entries(report: &mut ValidationReport, field: &str, entries: &[String]) {
    for (i, entry) in entries.iter().enumerate() {
        if entry.trim().is_empty() {
            report.error(format!("{}[{}]", field, i), "must not be blank");
        }
    }
}

/// Validate a card; structural violations are errors, quality nudges are warnings
pub fn validate_hypothesis_card(card: &HypothesisCard) -> ValidationReport {
    let mut report = ValidationReport::new();

    match parse_hypothesis_card_id(&card.id) {
        Ok(parts) if parts.version != card.version => {
            report.error(
                "version",
                format!("{} does not match id suffix v{}", card.version, parts.version),
            );
        }
        Ok(_) => {}
        Err(_) => report.error("id", format!("{:?} is not a valid hypothesis card id", card.id)),
    }
    if card.version == 0 {
        report.error("version", "must be a positive integer");
    }

    check_text_length(
        &mut report,
        "statement",
        &card.statement,
        STATEMENT_MIN_CHARS,
        STATEMENT_MAX_CHARS,
    );
    check_text_length(
        &mut report,
        "mechanism",
        &card.mechanism,
        MECHANISM_MIN_CHARS,
        MECHANISM_MAX_CHARS,
    );

    if card.predictions_if_true.is_empty() {
        report.error("predictionsIfTrue", "at least one prediction is required");
    }
    check_entries(&mut report, "predictionsIfTrue", &card.predictions_if_true);
    check_entries(&mut report, "predictionsIfFalse", &card.predictions_if_false);

    if card.impossible_if_true.is_empty() {
        report.error(
            "impossibleIfTrue",
            "at least one falsification condition is required",
        );
    }
    check_entries(&mut report, "impossibleIfTrue", &card.impossible_if_true);

    if !card.confidence.is_finite() || !(0.0..=100.0).contains(&card.confidence) {
        report.error("confidence", "must be between 0 and 100");
    }

    for (i, confound) in card.confounds.iter().enumerate() {
        if confound.name.trim().is_empty() {
            report.error(format!("confounds[{}].name", i), "is required");
        }
        if !confound.likelihood.is_finite() || !(0.0..=1.0).contains(&confound.likelihood) {
            report.error(
                format!("confounds[{}].likelihood", i),
                "must be between 0 and 1",
            );
        }
    }

    if card.predictions_if_false.is_empty() {
        report.warn(
            "predictionsIfFalse",
            "no counter-predictions; what would you expect if the hypothesis were wrong?",
        );
    }
    if card.confounds.is_empty() {
        report.warn("confounds", "no alternative explanations identified");
    }
    if is_generic_mechanism(&card.mechanism) {
        report.warn(
            "mechanism",
            "mechanism is generic; describe how the effect is produced",
        );
    }
    if card.domain.is_empty() {
        report.warn("domain", "no domain tags");
    }

    report
}

fn average_chars(entries: &[String]) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    let total: usize = entries.iter().map(|e| e.trim().chars().count()).sum();
    total as f64 / entries.len() as f64
}

/// How clearly the card states what would prove it wrong, 0 to 100
///
/// Factors:
/// - falsification conditions: 20 each, up to 3
/// - detail of those conditions: +15 for an average of 40+ chars, +8 for 20+
/// - counter-predictions present: +15
/// - confounds identified: +10
pub fn calculate_falsifiability_score(card: &HypothesisCard) -> u8 {
    let mut score = (card.impossible_if_true.len().min(3) * 20) as f64;

    let detail = average_chars(&card.impossible_if_true);
    if detail >= 40.0 {
        score += 15.0;
    } else if detail >= 20.0 {
        score += 8.0;
    }
    if !card.predictions_if_false.is_empty() {
        score += 15.0;
    }
    if !card.confounds.is_empty() {
        score += 10.0;
    }
    score.clamp(0.0, 100.0) as u8
}

/// How precisely the card commits to observable consequences, 0 to 100
pub fn calculate_specificity_score(card: &HypothesisCard) -> u8 {
    let mut score = 0.0;

    let statement_len = card.statement.trim().chars().count();
    if statement_len >= 50 {
        score += 20.0;
    } else if statement_len >= 25 {
        score += 10.0;
    }

    if !is_generic_mechanism(&card.mechanism) {
        score += if card.mechanism.trim().chars().count() >= 40 {
            20.0
        } else {
            10.0
        };
    }

    score += (card.predictions_if_true.len().min(3) * 10) as f64;

    let has_bold_prediction = card.all_predictions().any(|p| {
        matches!(
            assess_prediction_boldness(p),
            PredictionBoldness::Precise | PredictionBoldness::Surprising
        )
    });
    if has_bold_prediction {
        score += 15.0;
    }
    if !card.domain.is_empty() {
        score += 5.0;
    }
    score += (card.confounds.len().min(2) * 5) as f64;

    score.clamp(0.0, 100.0) as u8
}

/// Convenience for callers that escalate warnings themselves
pub fn ensure_valid(card: &HypothesisCard) -> Result<()> {
    let report = validate_hypothesis_card(card);
    if report.is_valid() {
        Ok(())
    } else {
        Err(BrennerError::Validation {
            entity: "hypothesis card",
            issues: report.errors,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_input() -> HypothesisCardInput {
        HypothesisCardInput {
            session_id: "RS-1".to_string(),
            sequence: 1,
            statement: "Morphogen gradients specify digit identity in the limb bud".to_string(),
            mechanism: "Sonic hedgehog concentration sets a positional threshold read by mesenchyme"
                .to_string(),
            domain: vec!["developmental biology".to_string()],
            predictions_if_true: vec![
                "Ectopic SHH source will increase digit number".to_string(),
                "Digit identity shifts by at least 30% with bead dose".to_string(),
            ],
            predictions_if_false: vec!["Digit number is unchanged by ectopic SHH".to_string()],
            impossible_if_true: vec![
                "Normal digit patterning in a limb with no SHH signalling at all".to_string(),
            ],
            confounds: vec![IdentifiedConfound::new(
                "Timing",
                "Exposure duration rather than concentration sets identity",
                0.4,
            )],
            ..Default::default()
        }
    }

    pub(crate) fn sample_card() -> HypothesisCard {
        create_hypothesis_card(sample_input()).unwrap()
    }

    #[test]
    fn test_create_applies_defaults() {
        let card = sample_card();
        assert_eq!(card.id, "HC-RS-1-001-v1");
        assert_eq!(card.version, 1);
        assert_eq!(card.confidence, 50.0);
        assert!(card.assumptions.is_empty());
        assert!(card.parent_version.is_none());
    }

    #[test]
    fn test_create_rejects_missing_falsification_condition() {
        let mut input = sample_input();
        input.impossible_if_true.clear();

        let err = create_hypothesis_card(input).unwrap_err();
        match err {
            BrennerError::Validation { issues, .. } => {
                assert!(issues.iter().any(|i| i.field == "impossibleIfTrue"));
            }
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_create_aggregates_errors() {
        let input = HypothesisCardInput {
            session_id: "S".to_string(),
            confidence: Some(140.0),
            ..Default::default()
        };
        let msg = create_hypothesis_card(input).unwrap_err().to_string();
        assert!(msg.contains("statement: is required"));
        assert!(msg.contains("mechanism: is required"));
        assert!(msg.contains("predictionsIfTrue"));
        assert!(msg.contains("impossibleIfTrue"));
        assert!(msg.contains("confidence: must be between 0 and 100"));
    }

    #[test]
    fn test_create_rejects_bad_session() {
        let mut input = sample_input();
        input.session_id = "-bad".to_string();
        assert!(matches!(
            create_hypothesis_card(input),
            Err(BrennerError::InvalidId(_))
        ));
    }

    #[test]
    fn test_statement_length_bounds() {
        let mut card = sample_card();
        card.statement = "too short".to_string();
        assert!(validate_hypothesis_card(&card).has_error_for("statement"));

        card.statement = "x".repeat(STATEMENT_MAX_CHARS + 1);
        assert!(validate_hypothesis_card(&card).has_error_for("statement"));

        card.statement = "x".repeat(STATEMENT_MAX_CHARS);
        assert!(!validate_hypothesis_card(&card).has_error_for("statement"));
    }

    #[test]
    fn test_warnings_never_block() {
        let mut input = sample_input();
        input.predictions_if_false.clear();
        input.confounds.clear();
        input.domain.clear();
        input.mechanism = "causes the digits to form differently".to_string();

        let card = create_hypothesis_card(input).unwrap();
        let report = validate_hypothesis_card(&card);
        assert!(report.is_valid());
        assert!(report.has_warning_for("predictionsIfFalse"));
        assert!(report.has_warning_for("confounds"));
        assert!(report.has_warning_for("mechanism"));
        assert!(report.has_warning_for("domain"));
    }

    #[test]
    fn test_generic_mechanism_detection() {
        assert!(is_generic_mechanism("Causes growth"));
        assert!(is_generic_mechanism("leads to apoptosis"));
        assert!(is_generic_mechanism("is related to stress"));
        assert!(!is_generic_mechanism("Kinase phosphorylates the receptor"));
    }

    #[test]
    fn test_confound_likelihood_range() {
        let mut card = sample_card();
        card.confounds[0].likelihood = 1.2;
        assert!(validate_hypothesis_card(&card).has_error_for("confounds[0].likelihood"));
    }

    #[test]
    fn test_evolve_increments_version_and_links_parent() {
        let card = sample_card();
        let changes = HypothesisCardChanges {
            statement: Some("Morphogen gradients and timing jointly specify digit identity".into()),
            ..Default::default()
        };
        let next = evolve_hypothesis_card(&card, changes, "Timing confound", Some("alice")).unwrap();

        assert_eq!(next.id, "HC-RS-1-001-v2");
        assert_eq!(next.version, 2);
        assert_eq!(next.parent_version.as_deref(), Some("HC-RS-1-001-v1"));
        assert_eq!(next.evolution_reason.as_deref(), Some("Timing confound"));
        assert_eq!(next.created_by.as_deref(), Some("alice"));
        // untouched fields carry over
        assert_eq!(next.mechanism, card.mechanism);
        // the source card is unchanged
        assert_eq!(card.version, 1);
    }

    #[test]
    fn test_evolve_twice_reconstructs_chain() {
        let h = sample_card();
        let v2 = evolve_hypothesis_card(&h, HypothesisCardChanges::default(), "r1", None).unwrap();
        let v3 = evolve_hypothesis_card(&v2, HypothesisCardChanges::default(), "r2", None).unwrap();

        assert_eq!(v3.version, h.version + 2);
        assert_eq!(v3.parent_version.as_deref(), Some(v2.id.as_str()));
        assert_eq!(v2.parent_version.as_deref(), Some(h.id.as_str()));
    }

    #[test]
    fn test_evolve_rejects_invalid_result() {
        let card = sample_card();
        let changes = HypothesisCardChanges {
            impossible_if_true: Some(Vec::new()),
            ..Default::default()
        };
        let err = evolve_hypothesis_card(&card, changes, "drop conditions", None).unwrap_err();
        assert!(err.to_string().contains("impossibleIfTrue"));
    }

    #[test]
    fn test_evolve_at_max_version_fails() {
        let mut card = sample_card();
        card.id = format!("HC-RS-1-001-v{}", u32::MAX);
        card.version = u32::MAX;
        assert!(validate_hypothesis_card(&card).is_valid());

        let err = evolve_hypothesis_card(&card, HypothesisCardChanges::default(), "refine", None)
            .unwrap_err();
        assert!(matches!(err, BrennerError::InvalidId(_)));
    }

    #[test]
    fn test_evolve_requires_reason() {
        let card = sample_card();
        let err = evolve_hypothesis_card(&card, HypothesisCardChanges::default(), "  ", None)
            .unwrap_err();
        assert!(err.to_string().contains("evolutionReason"));
    }

    #[test]
    fn test_evolve_rejects_unparseable_id() {
        let mut card = sample_card();
        card.id = "not-a-card".to_string();
        assert!(matches!(
            evolve_hypothesis_card(&card, HypothesisCardChanges::default(), "r", None),
            Err(BrennerError::InvalidId(_))
        ));
    }

    #[test]
    fn test_parse_hypothesis_card_round_trip() {
        let card = sample_card();
        let value = serde_json::to_value(&card).unwrap();
        assert!(value.get("impossibleIfTrue").is_some());

        let parsed = parse_hypothesis_card(&value).unwrap();
        assert_eq!(parsed, card);
    }

    #[test]
    fn test_parse_hypothesis_card_rejects_shape_and_rules() {
        assert!(matches!(
            parse_hypothesis_card(&serde_json::json!({"id": "HC-S-001-v1"})),
            Err(BrennerError::Serialization(_))
        ));

        let mut value = serde_json::to_value(sample_card()).unwrap();
        value["impossibleIfTrue"] = serde_json::json!([]);
        assert!(matches!(
            parse_hypothesis_card(&value),
            Err(BrennerError::Validation { .. })
        ));
    }

    #[test]
    fn test_falsifiability_score() {
        let card = sample_card();
        // one condition (20) + 40+ chars detail (15) + counter-prediction (15) + confound (10)
        assert_eq!(calculate_falsifiability_score(&card), 60);

        let mut bare = card.clone();
        bare.predictions_if_false.clear();
        bare.confounds.clear();
        bare.impossible_if_true = vec!["short".to_string()];
        assert_eq!(calculate_falsifiability_score(&bare), 20);
    }

    #[test]
    fn test_specificity_score_rewards_precision() {
        let card = sample_card();
        let score = calculate_specificity_score(&card);
        assert!(score >= 70, "got {score}");

        let mut vague = card.clone();
        vague.statement = "Things matter here".to_string();
        vague.mechanism = "causes stuff".to_string();
        vague.predictions_if_true = vec!["Something happens".to_string()];
        vague.predictions_if_false.clear();
        vague.domain.clear();
        vague.confounds.clear();
        assert!(calculate_specificity_score(&vague) < 20);
    }
}
