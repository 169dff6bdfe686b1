//! Summary views over an arena

use std::collections::HashSet;

use serde::Serialize;

use crate::hypothesis::TestResult;

use super::HypothesisArena;

/// One competitor column
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixColumn {
    pub hypothesis_id: String,
    pub statement: String,
    pub score: f64,
    pub eliminated: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixCell {
    pub hypothesis_id: String,
    pub targeted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TestResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
}

/// One test row; `cells` follow the column order
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRow {
    pub test_id: String,
    pub name: String,
    pub discriminative_power: u8,
    pub cells: Vec<MatrixCell>,
}

/// Test x hypothesis grid
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ComparisonMatrix {
    pub columns: Vec<MatrixColumn>,
    pub rows: Vec<MatrixRow>,
}

impl ComparisonMatrix {
    pub fn cell(&self, test_id: &str, hypothesis_id: &str) -> Option<&MatrixCell> {
        self.rows
            .iter()
            .find(|r| r.test_id == test_id)?
            .cells
            .iter()
            .find(|c| c.hypothesis_id == hypothesis_id)
    }
}

pub fn build_comparison_matrix(arena: &HypothesisArena) -> ComparisonMatrix {
    let columns = arena
        .competitors
        .iter()
        .map(|c| MatrixColumn {
            hypothesis_id: c.hypothesis_id.clone(),
            statement: c.statement.clone(),
            score: c.score,
            eliminated: c.eliminated,
        })
        .collect();

    let rows = arena
        .tests
        .iter()
        .map(|test| MatrixRow {
            test_id: test.id.clone(),
            name: test.name.clone(),
            discriminative_power: test.discriminative_power,
            cells: arena
                .competitors
                .iter()
                .map(|c| {
                    let recorded = test.result_for(&c.hypothesis_id);
                    MatrixCell {
                        hypothesis_id: c.hypothesis_id.clone(),
                        targeted: test.targets(&c.hypothesis_id),
                        prediction: test.predictions.get(&c.hypothesis_id).cloned(),
                        result: recorded.map(|r| r.result),
                        delta: recorded.map(|r| r.delta()),
                    }
                })
                .collect(),
        })
        .collect();

    ComparisonMatrix { columns, rows }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDiscrimination {
    pub test_id: String,
    pub name: String,
    pub discriminative_power: u8,
    pub results_recorded: usize,
    pub distinct_outcomes: usize,
    /// Produced different outcomes for different competitors
    pub discriminates: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaDiscrimination {
    pub tests: Vec<TestDiscrimination>,
    pub discriminating_tests: usize,
    pub eliminations: usize,
    /// Highest minus lowest active score
    pub score_spread: f64,
    /// Power-weighted share of tested power that separated competitors, 0.0 to 1.0
    pub overall: f64,
}

/// How well the arena's tests have separated its competitors
pub fn calculate_discriminative_power(arena: &HypothesisArena) -> ArenaDiscrimination {
    let tests: Vec<TestDiscrimination> = arena
        .tests
        .iter()
        .map(|test| {
            let outcomes: HashSet<TestResult> = test.results.iter().map(|r| r.result).collect();
            TestDiscrimination {
                test_id: test.id.clone(),
                name: test.name.clone(),
                discriminative_power: test.discriminative_power,
                results_recorded: test.results.len(),
                distinct_outcomes: outcomes.len(),
                discriminates: outcomes.len() > 1,
            }
        })
        .collect();

    let tested_power: u32 = tests
        .iter()
        .filter(|t| t.results_recorded > 0)
        .map(|t| u32::from(t.discriminative_power))
        .sum();
    let separating_power: u32 = tests
        .iter()
        .filter(|t| t.discriminates)
        .map(|t| u32::from(t.discriminative_power))
        .sum();
    let overall = if tested_power == 0 {
        0.0
    } else {
        f64::from(separating_power) / f64::from(tested_power)
    };

    let scores: Vec<f64> = arena.active_competitors().map(|c| c.score).collect();
    let score_spread = match (
        scores.iter().copied().reduce(f64::max),
        scores.iter().copied().reduce(f64::min),
    ) {
        (Some(max), Some(min)) => max - min,
        _ => 0.0,
    };

    ArenaDiscrimination {
        discriminating_tests: tests.iter().filter(|t| t.discriminates).count(),
        eliminations: arena.competitors.iter().filter(|c| c.eliminated).count(),
        score_spread,
        overall,
        tests,
    }
}
