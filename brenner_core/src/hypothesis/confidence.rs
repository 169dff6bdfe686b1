//! Confidence update heuristics
//!
//! Confidence is a 0-100 didactic score, not a calibrated posterior. An update
//! is a fixed base delta per result type, scaled by the prediction's boldness
//! and the test's discriminative power:
//!
//! `delta = base(result) * boldness * power / 5`
//!
//! Disconfirmation always weighs at least as much as confirmation of equal
//! power; an eliminating result weighs ten times a supporting one.

use std::sync::OnceLock;

use regex::RegexSet;
use serde::{Deserialize, Serialize};

use super::evidence::TestResult;

pub const MIN_CONFIDENCE: f64 = 0.0;
pub const MAX_CONFIDENCE: f64 = 100.0;
pub const MAX_DISCRIMINATIVE_POWER: u8 = 5;

/// Clamp into [0, 100]; NaN maps to 0
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_CONFIDENCE;
    }
    value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// How much a prediction sticks its neck out
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionBoldness {
    Vague,
    #[default]
    Specific,
    Precise,
    Surprising,
}

impl PredictionBoldness {
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Vague => 0.5,
            Self::Specific => 1.0,
            Self::Precise => 2.0,
            Self::Surprising => 3.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vague => "vague",
            Self::Specific => "specific",
            Self::Precise => "precise",
            Self::Surprising => "surprising",
        }
    }
}

impl std::fmt::Display for PredictionBoldness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base delta at full power and `specific` boldness
pub fn base_delta(result: TestResult) -> f64 {
    match result {
        TestResult::Supports => 10.0,
        TestResult::Challenges => -10.0,
        TestResult::Eliminates => -100.0,
        TestResult::Inconclusive => 0.0,
    }
}

/// The part of a test the engine needs
pub trait DiscriminatingTest {
    /// 1 (weak) to 5 (decisive)
    fn discriminative_power(&self) -> u8;
}

/// Minimal test description for callers that only know the power
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPower {
    pub discriminative_power: u8,
}

impl TestPower {
    pub fn new(discriminative_power: u8) -> Self {
        Self {
            discriminative_power,
        }
    }
}

impl DiscriminatingTest for TestPower {
    fn discriminative_power(&self) -> u8 {
        self.discriminative_power
    }
}

/// Result of one confidence update
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceUpdate {
    pub previous_confidence: f64,
    pub new_confidence: f64,
    /// `new_confidence - previous_confidence` after clamping
    pub delta: f64,
    pub result: TestResult,
    pub boldness: PredictionBoldness,
    pub discriminative_power: u8,
    pub explanation: String,
}

/// Update with the default `specific` boldness
pub fn compute_confidence_update<T: DiscriminatingTest + ?Sized>(
    current_confidence: f64,
    test: &T,
    result: TestResult,
) -> ConfidenceUpdate {
    compute_confidence_update_with_boldness(
        current_confidence,
        test,
        result,
        PredictionBoldness::default(),
    )
}

pub fn compute_confidence_update_with_boldness<T: DiscriminatingTest + ?Sized>(
    current_confidence: f64,
    test: &T,
    result: TestResult,
    boldness: PredictionBoldness,
) -> ConfidenceUpdate {
    let previous = clamp_confidence(current_confidence);
    let power = test.discriminative_power().clamp(1, MAX_DISCRIMINATIVE_POWER);
    let raw_delta = base_delta(result) * boldness.multiplier() * f64::from(power)
        / f64::from(MAX_DISCRIMINATIVE_POWER);
    let new_confidence = clamp_confidence(previous + raw_delta);

    ConfidenceUpdate {
        previous_confidence: previous,
        new_confidence,
        delta: new_confidence - previous,
        result,
        boldness,
        discriminative_power: power,
        explanation: explain(result, boldness, power),
    }
}

fn explain(result: TestResult, boldness: PredictionBoldness, power: u8) -> String {
    let strength = match power {
        5 => "decisive",
        4 => "strong",
        3 => "moderate",
        _ => "weak",
    };
    match result {
        TestResult::Supports => format!(
            "Survived a {} test of a {} prediction (power {}/5)",
            strength, boldness, power
        ),
        TestResult::Challenges => format!(
            "Challenged by a {} test of a {} prediction (power {}/5)",
            strength, boldness, power
        ),
        TestResult::Eliminates => format!(
            "Eliminated by a {} test of a {} prediction (power {}/5)",
            strength, boldness, power
        ),
        TestResult::Inconclusive => format!("Inconclusive result (power {}/5); no change", power),
    }
}

/// Counts of result types seen in a batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultCounts {
    pub supports: usize,
    pub challenges: usize,
    pub eliminates: usize,
    pub inconclusive: usize,
}

impl ResultCounts {
    pub fn record(&mut self, result: TestResult) {
        match result {
            TestResult::Supports => self.supports += 1,
            TestResult::Challenges => self.challenges += 1,
            TestResult::Eliminates => self.eliminates += 1,
            TestResult::Inconclusive => self.inconclusive += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.supports + self.challenges + self.eliminates + self.inconclusive
    }
}

/// Outcome of folding several results in order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfidenceUpdate {
    pub initial_confidence: f64,
    pub final_confidence: f64,
    pub total_delta: f64,
    pub updates: Vec<ConfidenceUpdate>,
    pub counts: ResultCounts,
}

/// Apply results sequentially; each step starts from the previous step's output
pub fn compute_batch_confidence_update<'a, T, I>(
    initial_confidence: f64,
    steps: I,
) -> BatchConfidenceUpdate
where
    T: DiscriminatingTest + 'a,
    I: IntoIterator<Item = (&'a T, TestResult)>,
{
    let initial = clamp_confidence(initial_confidence);
    let mut current = initial;
    let mut updates = Vec::new();
    let mut counts = ResultCounts::default();

    for (test, result) in steps {
        let update = compute_confidence_update(current, test, result);
        current = update.new_confidence;
        counts.record(result);
        updates.push(update);
    }

    BatchConfidenceUpdate {
        initial_confidence: initial,
        final_confidence: current,
        total_delta: current - initial,
        updates,
        counts,
    }
}

fn precise_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"\d+(\.\d+)?\s*%",
            r"(?i)\d+(\.\d+)?\s*(percent|fold|x\b|times)",
            r"(?i)\b(at least|at most|exactly|within)\s+\d",
        ])
        .expect("static regex set")
    })
}

fn surprising_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"(?i)\bcontrary to\b",
            r"(?i)\bunlike\b",
            r"(?i)\bopposite\b",
            r"(?i)\bdespite\b",
            r"(?i)\brather than\b",
            r"(?i)\bsurprising(ly)?\b",
            r"(?i)\bcounter-?intuitive(ly)?\b",
        ])
        .expect("static regex set")
    })
}

fn specific_patterns() -> &'static RegexSet {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"(?i)\bwill\s+(increase|decrease|rise|fall|drop|double|halve|reduce|grow|shrink|disappear|appear)\b",
            r"(?i)\b(increases?|decreases?|reduces?|abolish(es)?|blocks?)\b",
            r"(?i)\b(higher|lower|faster|slower|more|less|greater|fewer)\s+than\b",
        ])
        .expect("static regex set")
    })
}

/// Classify prediction text into a boldness tier
///
/// Checked in order: numeric/percentage claims are precise, contrastive
/// phrasing is surprising, directional claims are specific, anything else
/// is vague.
pub fn assess_prediction_boldness(text: &str) -> PredictionBoldness {
    if precise_patterns().is_match(text) {
        PredictionBoldness::Precise
    } else if surprising_patterns().is_match(text) {
        PredictionBoldness::Surprising
    } else if specific_patterns().is_match(text) {
        PredictionBoldness::Specific
    } else {
        PredictionBoldness::Vague
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_and_challenges_are_symmetric() {
        let test = TestPower::new(5);
        let up = compute_confidence_update(60.0, &test, TestResult::Supports);
        let down = compute_confidence_update(60.0, &test, TestResult::Challenges);

        assert_eq!(up.new_confidence, 70.0);
        assert_eq!(down.new_confidence, 50.0);
        assert_eq!(up.delta, -down.delta);
        assert_eq!(up.boldness, PredictionBoldness::Specific);
    }

    #[test]
    fn test_elimination_is_ten_times_support() {
        for power in 1..=5u8 {
            let s = base_delta(TestResult::Supports) * f64::from(power) / 5.0;
            let e = base_delta(TestResult::Eliminates) * f64::from(power) / 5.0;
            assert_eq!(e.abs(), 10.0 * s.abs());
        }
        // unclamped at low power
        let test = TestPower::new(1);
        let sup = compute_confidence_update(50.0, &test, TestResult::Supports);
        let chal = compute_confidence_update(50.0, &test, TestResult::Challenges);
        let elim = compute_confidence_update(50.0, &test, TestResult::Eliminates);
        assert_eq!(sup.delta, 2.0);
        assert_eq!(chal.delta, -2.0);
        assert_eq!(elim.delta, -20.0);
        assert!(elim.delta.abs() > chal.delta.abs());
    }

    #[test]
    fn test_disconfirmation_never_weaker() {
        let boldness = [
            PredictionBoldness::Vague,
            PredictionBoldness::Specific,
            PredictionBoldness::Precise,
            PredictionBoldness::Surprising,
        ];
        for power in 1..=5u8 {
            for b in boldness {
                let test = TestPower::new(power);
                let sup = compute_confidence_update_with_boldness(50.0, &test, TestResult::Supports, b);
                let elim =
                    compute_confidence_update_with_boldness(50.0, &test, TestResult::Eliminates, b);
                assert!(elim.delta.abs() >= sup.delta.abs());
            }
        }
    }

    #[test]
    fn test_boldness_multipliers() {
        let test = TestPower::new(5);
        let deltas: Vec<f64> = [
            PredictionBoldness::Vague,
            PredictionBoldness::Specific,
            PredictionBoldness::Precise,
            PredictionBoldness::Surprising,
        ]
        .into_iter()
        .map(|b| compute_confidence_update_with_boldness(50.0, &test, TestResult::Supports, b).delta)
        .collect();
        assert_eq!(deltas, vec![5.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_clamped_at_boundaries() {
        let test = TestPower::new(5);
        let up = compute_confidence_update_with_boldness(
            95.0,
            &test,
            TestResult::Supports,
            PredictionBoldness::Surprising,
        );
        assert_eq!(up.new_confidence, 100.0);
        assert_eq!(up.delta, 5.0);

        let down = compute_confidence_update(3.0, &test, TestResult::Eliminates);
        assert_eq!(down.new_confidence, 0.0);
        assert_eq!(down.delta, -3.0);

        let weird = compute_confidence_update(250.0, &test, TestResult::Inconclusive);
        assert_eq!(weird.new_confidence, 100.0);

        let nan = compute_confidence_update(f64::NAN, &test, TestResult::Supports);
        assert!((0.0..=100.0).contains(&nan.new_confidence));
    }

    #[test]
    fn test_inconclusive_changes_nothing() {
        let update = compute_confidence_update(42.0, &TestPower::new(4), TestResult::Inconclusive);
        assert_eq!(update.new_confidence, 42.0);
        assert_eq!(update.delta, 0.0);
        assert!(update.explanation.contains("no change"));
    }

    #[test]
    fn test_power_is_clamped() {
        let zero = compute_confidence_update(50.0, &TestPower::new(0), TestResult::Supports);
        assert_eq!(zero.discriminative_power, 1);
        let huge = compute_confidence_update(50.0, &TestPower::new(9), TestResult::Supports);
        assert_eq!(huge.discriminative_power, 5);
    }

    #[test]
    fn test_batch_folds_sequentially() {
        let strong = TestPower::new(5);
        let weak = TestPower::new(1);
        let batch = compute_batch_confidence_update(
            50.0,
            vec![
                (&strong, TestResult::Supports),
                (&weak, TestResult::Challenges),
                (&strong, TestResult::Inconclusive),
                (&strong, TestResult::Supports),
            ],
        );

        assert_eq!(batch.updates.len(), 4);
        assert_eq!(batch.updates[1].previous_confidence, 60.0);
        assert_eq!(batch.updates[1].new_confidence, 58.0);
        assert_eq!(batch.final_confidence, 68.0);
        assert_eq!(batch.total_delta, 18.0);
        assert_eq!(batch.counts.supports, 2);
        assert_eq!(batch.counts.challenges, 1);
        assert_eq!(batch.counts.inconclusive, 1);
        assert_eq!(batch.counts.total(), 4);
    }

    #[test]
    fn test_batch_empty() {
        let batch = compute_batch_confidence_update::<TestPower, _>(30.0, Vec::new());
        assert_eq!(batch.final_confidence, 30.0);
        assert!(batch.updates.is_empty());
    }

    #[test]
    fn test_assess_boldness() {
        assert_eq!(
            assess_prediction_boldness("Expression will drop by 40% within a day"),
            PredictionBoldness::Precise
        );
        assert_eq!(
            assess_prediction_boldness("Contrary to the textbook view, knockouts survive"),
            PredictionBoldness::Surprising
        );
        assert_eq!(
            assess_prediction_boldness("Mutant flies will increase grooming"),
            PredictionBoldness::Specific
        );
        assert_eq!(
            assess_prediction_boldness("Yield is higher than in controls"),
            PredictionBoldness::Specific
        );
        assert_eq!(
            assess_prediction_boldness("Something interesting happens"),
            PredictionBoldness::Vague
        );
    }

    #[test]
    fn test_boldness_serializes_snake_case() {
        let json = serde_json::to_string(&PredictionBoldness::Surprising).unwrap();
        assert_eq!(json, "\"surprising\"");
    }
}
