//! Competition between rival hypotheses
//!
//! An arena holds the hypotheses that answer one research question and the
//! tests run against them. Each recorded result moves the competitor's score
//! with the same heuristic the confidence engine uses for single cards.
//! Eliminated competitors stay in the arena for the audit trail.

mod matrix;

pub use matrix::{
    build_comparison_matrix, calculate_discriminative_power, ArenaDiscrimination,
    ComparisonMatrix, MatrixCell, MatrixColumn, MatrixRow, TestDiscrimination,
};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{BrennerError, Result, ValidationReport};
use crate::hypothesis::card::ensure_valid;
use crate::hypothesis::confidence::{
    assess_prediction_boldness, clamp_confidence, compute_confidence_update_with_boldness,
    PredictionBoldness, TestPower, MAX_DISCRIMINATIVE_POWER,
};
use crate::hypothesis::{HypothesisCard, TestResult};
use crate::ids::{generate_arena_id, generate_arena_test_id, generate_test_result_id};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArenaStatus {
    #[default]
    Open,
    Resolved,
}

/// How a competitor entered the arena
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitorSource {
    /// The hypothesis the arena was created for
    Primary,
    #[default]
    User,
    Agent,
    /// A branch of an existing competitor
    Evolution,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaHypothesis {
    pub hypothesis_id: String,
    pub statement: String,
    /// Running score, 0 to 100; starts at the card's confidence
    pub score: f64,
    pub source: CompetitorSource,
    #[serde(with = "crate::timestamp")]
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub eliminated: bool,
    #[serde(default, with = "crate::timestamp::option", skip_serializing_if = "Option::is_none")]
    pub eliminated_at: Option<DateTime<Utc>>,
    /// Test that eliminated it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eliminated_by: Option<String>,
}

impl ArenaHypothesis {
    pub fn is_active(&self) -> bool {
        !self.eliminated
    }
}

/// Outcome of one test for one competitor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaTestResult {
    /// `TR-{uuid}`
    pub id: String,
    pub hypothesis_id: String,
    pub result: TestResult,
    /// Observer certainty in the reading, 0.0 to 1.0
    pub confidence: f64,
    pub boldness: PredictionBoldness,
    pub score_before: f64,
    pub score_after: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(with = "crate::timestamp")]
    pub recorded_at: DateTime<Utc>,
}

impl ArenaTestResult {
    pub fn delta(&self) -> f64 {
        self.score_after - self.score_before
    }
}

/// A test shared by several competitors
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaTest {
    /// `AT-{uuid}`
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub discriminative_power: u8,
    pub target_hypotheses: Vec<String>,
    /// What each targeted hypothesis predicts for this test
    #[serde(default)]
    pub predictions: IndexMap<String, String>,
    #[serde(default)]
    pub results: Vec<ArenaTestResult>,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl ArenaTest {
    pub fn targets(&self, hypothesis_id: &str) -> bool {
        self.target_hypotheses.iter().any(|h| h == hypothesis_id)
    }

    pub fn result_for(&self, hypothesis_id: &str) -> Option<&ArenaTestResult> {
        self.results.iter().find(|r| r.hypothesis_id == hypothesis_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HypothesisArena {
    /// `ARENA-{uuid}`
    pub id: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub competitors: Vec<ArenaHypothesis>,
    #[serde(default)]
    pub tests: Vec<ArenaTest>,
    #[serde(default)]
    pub status: ArenaStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_reason: Option<String>,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "crate::timestamp::option", skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl HypothesisArena {
    pub fn competitor(&self, hypothesis_id: &str) -> Option<&ArenaHypothesis> {
        self.competitors
            .iter()
            .find(|c| c.hypothesis_id == hypothesis_id)
    }

    pub fn test(&self, test_id: &str) -> Option<&ArenaTest> {
        self.tests.iter().find(|t| t.id == test_id)
    }

    pub fn active_competitors(&self) -> impl Iterator<Item = &ArenaHypothesis> {
        self.competitors.iter().filter(|c| c.is_active())
    }

    pub fn is_resolved(&self) -> bool {
        self.status == ArenaStatus::Resolved
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_resolved() {
            Err(BrennerError::InvalidState(format!(
                "Arena {} is already resolved",
                self.id
            )))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Debug)]
pub struct CreateArenaInput {
    pub question: String,
    pub primary_hypothesis: HypothesisCard,
    pub session_id: Option<String>,
}

/// Test registration; empty `target_hypotheses` targets every active competitor
#[derive(Clone, Debug, Default)]
pub struct ArenaTestInput {
    pub name: String,
    pub description: String,
    pub discriminative_power: u8,
    pub target_hypotheses: Vec<String>,
    pub predictions: IndexMap<String, String>,
}

/// Optional qualifiers for a recorded result
#[derive(Clone, Debug, Default)]
pub struct RecordResultOptions {
    /// Scales the score movement; defaults to 1.0
    pub confidence: Option<f64>,
    /// Overrides the boldness read from the test's prediction
    pub boldness: Option<PredictionBoldness>,
    pub notes: Option<String>,
}

fn competitor_from(card: &HypothesisCard, source: CompetitorSource, now: DateTime<Utc>) -> ArenaHypothesis {
    ArenaHypothesis {
        hypothesis_id: card.id.clone(),
        statement: card.statement.clone(),
        score: clamp_confidence(card.confidence),
        source,
        added_at: now,
        eliminated: false,
        eliminated_at: None,
        eliminated_by: None,
    }
}

/// Open an arena seeded with one competitor
pub fn create_arena(input: CreateArenaInput) -> Result<HypothesisArena> {
    let mut report = ValidationReport::new();
    if input.question.trim().is_empty() {
        report.error("question", "is required");
    }
    report.into_result("arena")?;
    ensure_valid(&input.primary_hypothesis)?;

    let now = Utc::now();
    let arena = HypothesisArena {
        id: generate_arena_id(),
        question: input.question.trim().to_string(),
        session_id: input.session_id,
        competitors: vec![competitor_from(
            &input.primary_hypothesis,
            CompetitorSource::Primary,
            now,
        )],
        tests: Vec::new(),
        status: ArenaStatus::Open,
        winner_id: None,
        resolution_reason: None,
        created_at: now,
        updated_at: now,
        resolved_at: None,
    };
    tracing::debug!("Created arena {} for {}", arena.id, input.primary_hypothesis.id);
    Ok(arena)
}

pub fn add_competitor(
    arena: &HypothesisArena,
    card: &HypothesisCard,
    source: CompetitorSource,
) -> Result<HypothesisArena> {
    arena.ensure_open()?;
    if arena.competitor(&card.id).is_some() {
        return Err(BrennerError::AlreadyExists(format!(
            "Hypothesis {} is already in this arena",
            card.id
        )));
    }
    ensure_valid(card)?;

    let now = Utc::now();
    let mut next = arena.clone();
    next.competitors.push(competitor_from(card, source, now));
    next.updated_at = now;
    Ok(next)
}

/// Register a shared test; returns the updated arena and the new test id
pub fn create_arena_test(
    arena: &HypothesisArena,
    input: ArenaTestInput,
) -> Result<(HypothesisArena, String)> {
    arena.ensure_open()?;

    let mut report = ValidationReport::new();
    if input.name.trim().is_empty() {
        report.error("name", "is required");
    }
    if !(1..=MAX_DISCRIMINATIVE_POWER).contains(&input.discriminative_power) {
        report.error("discriminativePower", "must be between 1 and 5");
    }
    let targets: Vec<String> = if input.target_hypotheses.is_empty() {
        arena
            .active_competitors()
            .map(|c| c.hypothesis_id.clone())
            .collect()
    } else {
        input.target_hypotheses
    };
    for (i, target) in targets.iter().enumerate() {
        if arena.competitor(target).is_none() {
            report.error(
                format!("targetHypotheses[{}]", i),
                format!("{} is not in this arena", target),
            );
        }
    }
    for hypothesis_id in input.predictions.keys() {
        if !targets.contains(hypothesis_id) {
            report.error(
                "predictions",
                format!("{} is not targeted by this test", hypothesis_id),
            );
        }
    }
    report.into_result("arena test")?;

    let now = Utc::now();
    let test = ArenaTest {
        id: generate_arena_test_id(),
        name: input.name.trim().to_string(),
        description: input.description,
        discriminative_power: input.discriminative_power,
        target_hypotheses: targets,
        predictions: input.predictions,
        results: Vec::new(),
        created_at: now,
    };
    let test_id = test.id.clone();

    let mut next = arena.clone();
    next.tests.push(test);
    next.updated_at = now;
    Ok((next, test_id))
}

/// Apply one test outcome to one competitor's score
///
/// # Errors
/// - `InvalidState` if the arena is resolved, the competitor is already
///   eliminated, or the test does not target it
/// - `NotFound` for an unknown test or competitor
/// - `AlreadyExists` if this test already has a result for the competitor
/// - `Validation` if `confidence` is outside 0.0 to 1.0
pub fn record_test_result(
    arena: &HypothesisArena,
    test_id: &str,
    hypothesis_id: &str,
    result: TestResult,
    options: RecordResultOptions,
) -> Result<HypothesisArena> {
    arena.ensure_open()?;
    let test = arena
        .test(test_id)
        .ok_or_else(|| BrennerError::NotFound(format!("Test not found: {}", test_id)))?;
    let competitor = arena.competitor(hypothesis_id).ok_or_else(|| {
        BrennerError::NotFound(format!("Hypothesis {} is not in this arena", hypothesis_id))
    })?;
    if competitor.eliminated {
        return Err(BrennerError::InvalidState(format!(
            "Hypothesis {} has already been eliminated",
            hypothesis_id
        )));
    }
    if !test.targets(hypothesis_id) {
        return Err(BrennerError::InvalidState(format!(
            "Test {} does not target {}",
            test_id, hypothesis_id
        )));
    }
    if test.result_for(hypothesis_id).is_some() {
        return Err(BrennerError::AlreadyExists(format!(
            "Test {} already has a result for {}",
            test_id, hypothesis_id
        )));
    }

    let certainty = options.confidence.unwrap_or(1.0);
    let mut report = ValidationReport::new();
    if !certainty.is_finite() || !(0.0..=1.0).contains(&certainty) {
        report.error("confidence", "must be between 0 and 1");
    }
    report.into_result("test result")?;

    let boldness = options.boldness.unwrap_or_else(|| {
        test.predictions
            .get(hypothesis_id)
            .map(|p| assess_prediction_boldness(p))
            .unwrap_or_default()
    });
    let update = compute_confidence_update_with_boldness(
        competitor.score,
        &TestPower::new(test.discriminative_power),
        result,
        boldness,
    );
    let score_after = clamp_confidence(competitor.score + update.delta * certainty);

    let now = Utc::now();
    let recorded = ArenaTestResult {
        id: generate_test_result_id(),
        hypothesis_id: hypothesis_id.to_string(),
        result,
        confidence: certainty,
        boldness,
        score_before: competitor.score,
        score_after,
        notes: options.notes,
        recorded_at: now,
    };

    let mut next = arena.clone();
    if let Some(t) = next.tests.iter_mut().find(|t| t.id == test_id) {
        t.results.push(recorded);
    }
    if let Some(c) = next
        .competitors
        .iter_mut()
        .find(|c| c.hypothesis_id == hypothesis_id)
    {
        c.score = score_after;
        if result == TestResult::Eliminates {
            c.eliminated = true;
            c.eliminated_at = Some(now);
            c.eliminated_by = Some(test_id.to_string());
            tracing::info!(
                "Hypothesis {} eliminated by test {} in arena {}",
                hypothesis_id,
                test_id,
                arena.id
            );
        }
    }
    next.updated_at = now;
    Ok(next)
}

/// Active competitors, best score first; ties keep insertion order
pub fn get_ranked_hypotheses(arena: &HypothesisArena) -> Vec<&ArenaHypothesis> {
    let mut ranked: Vec<&ArenaHypothesis> = arena.active_competitors().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

/// Sole survivor once every other competitor has been eliminated
pub fn suggest_resolution(arena: &HypothesisArena) -> Option<&ArenaHypothesis> {
    if arena.is_resolved() || arena.competitors.len() < 2 {
        return None;
    }
    let mut active = arena.active_competitors();
    match (active.next(), active.next()) {
        (Some(survivor), None) => Some(survivor),
        _ => None,
    }
}

pub fn resolve_arena(
    arena: &HypothesisArena,
    winner_id: &str,
    reason: &str,
) -> Result<HypothesisArena> {
    arena.ensure_open()?;
    let winner = arena.competitor(winner_id).ok_or_else(|| {
        BrennerError::NotFound(format!("Hypothesis {} is not in this arena", winner_id))
    })?;
    if winner.eliminated {
        return Err(BrennerError::InvalidState(format!(
            "Eliminated hypothesis {} cannot win",
            winner_id
        )));
    }
    let mut report = ValidationReport::new();
    if reason.trim().is_empty() {
        report.error("resolutionReason", "is required");
    }
    report.into_result("arena resolution")?;

    let now = Utc::now();
    let mut next = arena.clone();
    next.status = ArenaStatus::Resolved;
    next.winner_id = Some(winner_id.to_string());
    next.resolution_reason = Some(reason.trim().to_string());
    next.resolved_at = Some(now);
    next.updated_at = now;

    tracing::info!("Arena {} resolved in favour of {}", arena.id, winner_id);
    Ok(next)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::hypothesis::card::tests::sample_card;

    pub(crate) fn rival_card(seq: u32, confidence: f64) -> HypothesisCard {
        let mut card = sample_card();
        card.id = format!("HC-RS-1-{:03}-v1", seq);
        card.statement = format!("Rival explanation number {} for digit identity", seq);
        card.confidence = confidence;
        card
    }

    /// Three competitors and one test targeting all of them
    pub(crate) fn contested_arena() -> (HypothesisArena, String) {
        let arena = create_arena(CreateArenaInput {
            question: "What specifies digit identity?".to_string(),
            primary_hypothesis: sample_card(),
            session_id: Some("RS-1".to_string()),
        })
        .unwrap();
        let arena = add_competitor(&arena, &rival_card(2, 50.0), CompetitorSource::User).unwrap();
        let arena = add_competitor(&arena, &rival_card(3, 50.0), CompetitorSource::Agent).unwrap();

        let mut predictions = IndexMap::new();
        predictions.insert(
            "HC-RS-1-001-v1".to_string(),
            "Digit number will increase with bead dose".to_string(),
        );
        create_arena_test(
            &arena,
            ArenaTestInput {
                name: "Bead implant".to_string(),
                description: "Implant SHH-soaked beads anteriorly".to_string(),
                discriminative_power: 5,
                predictions,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_create_arena_seeds_primary() {
        let (arena, _) = contested_arena();
        assert!(arena.id.starts_with("ARENA-"));
        assert_eq!(arena.status, ArenaStatus::Open);
        assert_eq!(arena.competitors[0].source, CompetitorSource::Primary);
        assert_eq!(arena.competitors[0].score, 50.0);
    }

    #[test]
    fn test_create_arena_requires_question() {
        let err = create_arena(CreateArenaInput {
            question: "  ".to_string(),
            primary_hypothesis: sample_card(),
            session_id: None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("question"));
    }

    #[test]
    fn test_duplicate_competitor() {
        let (arena, _) = contested_arena();
        let err = add_competitor(&arena, &sample_card(), CompetitorSource::User).unwrap_err();
        assert!(err.to_string().contains("already in this arena"));
        assert_eq!(arena.competitors.len(), 3);
    }

    #[test]
    fn test_empty_targets_default_to_active_competitors() {
        let (arena, test_id) = contested_arena();
        let test = arena.test(&test_id).unwrap();
        assert!(test.id.starts_with("AT-"));
        assert_eq!(test.target_hypotheses.len(), 3);
    }

    #[test]
    fn test_create_test_validates_targets() {
        let (arena, _) = contested_arena();
        let err = create_arena_test(
            &arena,
            ArenaTestInput {
                name: "Ghost".to_string(),
                discriminative_power: 6,
                target_hypotheses: vec!["HC-RS-1-099-v1".to_string()],
                ..Default::default()
            },
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("discriminativePower"));
        assert!(msg.contains("targetHypotheses[0]"));
    }

    #[test]
    fn test_record_support_uses_prediction_boldness() {
        let (arena, test_id) = contested_arena();
        let next = record_test_result(
            &arena,
            &test_id,
            "HC-RS-1-001-v1",
            TestResult::Supports,
            RecordResultOptions::default(),
        )
        .unwrap();

        let result = next.test(&test_id).unwrap().result_for("HC-RS-1-001-v1").unwrap();
        assert!(result.id.starts_with("TR-"));
        // "will increase" reads as a specific prediction: +10 at full power
        assert_eq!(result.boldness, PredictionBoldness::Specific);
        assert_eq!(result.delta(), 10.0);
        assert_eq!(next.competitor("HC-RS-1-001-v1").unwrap().score, 60.0);
        // input untouched
        assert_eq!(arena.competitor("HC-RS-1-001-v1").unwrap().score, 50.0);
    }

    #[test]
    fn test_record_scales_by_certainty() {
        let (arena, test_id) = contested_arena();
        let next = record_test_result(
            &arena,
            &test_id,
            "HC-RS-1-002-v1",
            TestResult::Challenges,
            RecordResultOptions {
                confidence: Some(0.5),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(next.competitor("HC-RS-1-002-v1").unwrap().score, 45.0);

        let err = record_test_result(
            &arena,
            &test_id,
            "HC-RS-1-002-v1",
            TestResult::Challenges,
            RecordResultOptions {
                confidence: Some(1.5),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("confidence"));
    }

    #[test]
    fn test_elimination_retains_competitor() {
        let (arena, test_id) = contested_arena();
        let next = record_test_result(
            &arena,
            &test_id,
            "HC-RS-1-003-v1",
            TestResult::Eliminates,
            RecordResultOptions::default(),
        )
        .unwrap();

        assert_eq!(next.competitors.len(), 3);
        let eliminated = next.competitor("HC-RS-1-003-v1").unwrap();
        assert!(eliminated.eliminated);
        assert_eq!(eliminated.score, 0.0);
        assert_eq!(eliminated.eliminated_by.as_deref(), Some(test_id.as_str()));
        assert_eq!(get_ranked_hypotheses(&next).len(), 2);

        let (next, second) = create_arena_test(
            &next,
            ArenaTestInput {
                name: "Retest".to_string(),
                discriminative_power: 3,
                target_hypotheses: vec!["HC-RS-1-003-v1".to_string()],
                ..Default::default()
            },
        )
        .unwrap();
        let err = record_test_result(
            &next,
            &second,
            "HC-RS-1-003-v1",
            TestResult::Supports,
            RecordResultOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BrennerError::InvalidState(_)));
    }

    #[test]
    fn test_record_rejects_duplicates_and_unknowns() {
        let (arena, test_id) = contested_arena();
        let once = record_test_result(
            &arena,
            &test_id,
            "HC-RS-1-001-v1",
            TestResult::Supports,
            RecordResultOptions::default(),
        )
        .unwrap();
        assert!(matches!(
            record_test_result(
                &once,
                &test_id,
                "HC-RS-1-001-v1",
                TestResult::Supports,
                RecordResultOptions::default()
            ),
            Err(BrennerError::AlreadyExists(_))
        ));
        assert!(matches!(
            record_test_result(
                &arena,
                "AT-missing",
                "HC-RS-1-001-v1",
                TestResult::Supports,
                RecordResultOptions::default()
            ),
            Err(BrennerError::NotFound(_))
        ));
    }

    #[test]
    fn test_ranking_is_stable() {
        let (arena, test_id) = contested_arena();
        let next = record_test_result(
            &arena,
            &test_id,
            "HC-RS-1-003-v1",
            TestResult::Supports,
            RecordResultOptions::default(),
        )
        .unwrap();
        let ranked: Vec<&str> = get_ranked_hypotheses(&next)
            .iter()
            .map(|c| c.hypothesis_id.as_str())
            .collect();
        assert_eq!(ranked, vec!["HC-RS-1-003-v1", "HC-RS-1-001-v1", "HC-RS-1-002-v1"]);
    }

    #[test]
    fn test_suggest_and_resolve() {
        let (arena, test_id) = contested_arena();
        assert!(suggest_resolution(&arena).is_none());

        let mut next = arena.clone();
        for loser in ["HC-RS-1-002-v1", "HC-RS-1-003-v1"] {
            next = record_test_result(
                &next,
                &test_id,
                loser,
                TestResult::Eliminates,
                RecordResultOptions::default(),
            )
            .unwrap();
        }
        let survivor = suggest_resolution(&next).unwrap();
        assert_eq!(survivor.hypothesis_id, "HC-RS-1-001-v1");

        let err = resolve_arena(&next, "HC-RS-1-002-v1", "nope").unwrap_err();
        assert!(matches!(err, BrennerError::InvalidState(_)));

        let resolved = resolve_arena(&next, "HC-RS-1-001-v1", "Only survivor").unwrap();
        assert!(resolved.is_resolved());
        assert_eq!(resolved.winner_id.as_deref(), Some("HC-RS-1-001-v1"));
        assert!(resolved.resolved_at.is_some());
        assert!(suggest_resolution(&resolved).is_none());

        let err = record_test_result(
            &resolved,
            &test_id,
            "HC-RS-1-001-v1",
            TestResult::Supports,
            RecordResultOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("already resolved"));
    }

    #[test]
    fn test_arena_serde_round_trip() {
        let (arena, _) = contested_arena();
        let json = serde_json::to_value(&arena).unwrap();
        assert_eq!(json["status"], "open");
        assert_eq!(json["competitors"][0]["source"], "primary");
        let back: HypothesisArena = serde_json::from_value(json).unwrap();
        assert_eq!(back, arena);
    }
}
