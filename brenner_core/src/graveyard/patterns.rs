//! Aggregate views over many graveyard entries

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::config::GraveyardConfig;

use super::{DeathType, FalsifiedHypothesis};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DomainCount {
    pub domain: String,
    pub count: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraveyardStats {
    pub total: usize,
    pub by_death_type: BTreeMap<DeathType, usize>,
    pub average_lessons: f64,
    pub with_successors: usize,
    /// Share of entries with at least one successor, 0.0 to 1.0
    pub successor_rate: f64,
    pub with_epitaph: usize,
    pub epitaph_rate: f64,
    /// Most frequent card domains, most common first
    pub top_domains: Vec<DomainCount>,
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

pub fn calculate_graveyard_stats(entries: &[FalsifiedHypothesis]) -> GraveyardStats {
    calculate_graveyard_stats_with(entries, &GraveyardConfig::default())
}

pub fn calculate_graveyard_stats_with(
    entries: &[FalsifiedHypothesis],
    config: &GraveyardConfig,
) -> GraveyardStats {
    let total = entries.len();
    let mut by_death_type = BTreeMap::new();
    let mut domains: HashMap<&str, usize> = HashMap::new();
    let mut lessons = 0;
    for entry in entries {
        *by_death_type.entry(entry.death_type).or_insert(0) += 1;
        lessons += entry.learning.lessons_learned.len();
        for domain in &entry.hypothesis.domain {
            *domains.entry(domain.as_str()).or_insert(0) += 1;
        }
    }

    let mut top_domains: Vec<DomainCount> = domains
        .into_iter()
        .map(|(domain, count)| DomainCount {
            domain: domain.to_string(),
            count,
        })
        .collect();
    top_domains.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.domain.cmp(&b.domain)));
    top_domains.truncate(config.top_domains);

    let with_successors = entries.iter().filter(|e| e.has_successors()).count();
    let with_epitaph = entries.iter().filter(|e| e.has_epitaph()).count();

    GraveyardStats {
        total,
        by_death_type,
        average_lessons: share(lessons, total),
        with_successors,
        successor_rate: share(with_successors, total),
        with_epitaph,
        epitaph_rate: share(with_epitaph, total),
        top_domains,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePatternKind {
    DominantDeathType,
    ProductiveFailures,
    UnprocessedFailures,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailurePattern {
    pub kind: FailurePatternKind,
    pub name: String,
    pub description: String,
    /// Fraction of all entries that show the pattern
    pub share: f64,
    pub entry_ids: Vec<String>,
}

pub fn analyze_failure_patterns(entries: &[FalsifiedHypothesis]) -> Vec<FailurePattern> {
    analyze_failure_patterns_with(entries, &GraveyardConfig::default())
}

/// Named patterns across the graveyard
///
/// - dominant death type, when it covers at least `dominant_share`
/// - productive failures, entries that led to a successor
/// - unprocessed failures, entries without an epitaph, when more than
///   `unprocessed_share` of the graveyard qualifies
pub fn analyze_failure_patterns_with(
    entries: &[FalsifiedHypothesis],
    config: &GraveyardConfig,
) -> Vec<FailurePattern> {
    let total = entries.len();
    let mut patterns = Vec::new();
    if total == 0 {
        return patterns;
    }

    let ids_where = |pred: &dyn Fn(&FalsifiedHypothesis) -> bool| -> Vec<String> {
        entries
            .iter()
            .filter(|e| pred(e))
            .map(|e| e.id.clone())
            .collect()
    };

    // first death type in declaration order wins a tie
    let dominant = DeathType::ALL
        .into_iter()
        .map(|dt| (dt, entries.iter().filter(|e| e.death_type == dt).count()))
        .fold(None, |best: Option<(DeathType, usize)>, (dt, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((dt, count)),
        });
    if let Some((death_type, count)) = dominant {
        let dominant_share = share(count, total);
        if count > 0 && dominant_share >= config.dominant_share {
            patterns.push(FailurePattern {
                kind: FailurePatternKind::DominantDeathType,
                name: format!("Recurring {}", death_type.label()),
                description: format!(
                    "{} of {} hypotheses died by {}",
                    count,
                    total,
                    death_type.label().to_lowercase()
                ),
                share: dominant_share,
                entry_ids: ids_where(&|e| e.death_type == death_type),
            });
        }
    }

    let productive = ids_where(&|e| e.has_successors());
    if !productive.is_empty() {
        patterns.push(FailurePattern {
            kind: FailurePatternKind::ProductiveFailures,
            name: "Productive Failures".to_string(),
            description: format!(
                "{} of {} failures led directly to a successor hypothesis",
                productive.len(),
                total
            ),
            share: share(productive.len(), total),
            entry_ids: productive,
        });
    }

    let unprocessed = ids_where(&|e| !e.has_epitaph());
    let unprocessed_share = share(unprocessed.len(), total);
    if unprocessed_share > config.unprocessed_share {
        patterns.push(FailurePattern {
            kind: FailurePatternKind::UnprocessedFailures,
            name: "Unprocessed Failures".to_string(),
            description: format!(
                "{} of {} failures have no epitaph; write down what each one taught",
                unprocessed.len(),
                total
            ),
            share: unprocessed_share,
            entry_ids: unprocessed,
        });
    }

    patterns
}
