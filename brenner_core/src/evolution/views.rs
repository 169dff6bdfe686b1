//! Read-only projections of the history store

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use petgraph::visit::EdgeRef;
use serde::Serialize;

use crate::errors::Result;

use super::{EvolutionTrigger, HypothesisHistoryStore, HypothesisVersion};

const LABEL_MAX_CHARS: usize = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Current,
    Abandoned,
    /// Superseded by a child version
    Historical,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionNode {
    pub id: String,
    pub version: u32,
    pub label: String,
    pub trigger: EvolutionTrigger,
    pub status: VersionStatus,
    pub is_root: bool,
    pub confidence: f64,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionEdge {
    pub from: String,
    pub to: String,
    pub trigger: EvolutionTrigger,
}

/// Node/edge lists for rendering
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EvolutionGraph {
    pub nodes: Vec<EvolutionNode>,
    pub edges: Vec<EvolutionEdge>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionStats {
    pub total_versions: usize,
    pub root_count: usize,
    pub current_count: usize,
    pub abandoned_count: usize,
    /// Versions per trigger; roots count under the trigger they were added with
    pub by_trigger: BTreeMap<EvolutionTrigger, usize>,
    /// Longest parent chain, in edges
    pub max_depth: usize,
    /// Versions with more than one child
    pub branch_points: usize,
}

fn truncate_label(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= LABEL_MAX_CHARS {
        return text.to_string();
    }
    let mut label: String = text.chars().take(LABEL_MAX_CHARS - 3).collect();
    label.push_str("...");
    label
}

fn node_for(store: &HypothesisHistoryStore, version: &HypothesisVersion) -> EvolutionNode {
    let id = version.id();
    let status = if store.is_abandoned(id) {
        VersionStatus::Abandoned
    } else if store.is_current(id) {
        VersionStatus::Current
    } else {
        VersionStatus::Historical
    };
    EvolutionNode {
        id: id.to_string(),
        version: version.hypothesis.version,
        label: truncate_label(&version.hypothesis.statement),
        trigger: version.trigger,
        status,
        is_root: version.is_root(),
        confidence: version.hypothesis.confidence,
        created_at: version.hypothesis.created_at,
    }
}

fn build_graph(store: &HypothesisHistoryStore, include: impl Fn(&str) -> bool) -> EvolutionGraph {
    let nodes = store
        .versions()
        .filter(|v| include(v.id()))
        .map(|v| node_for(store, v))
        .collect();

    let graph = store.graph();
    let mut edges: Vec<EvolutionEdge> = graph
        .edge_references()
        .map(|e| EvolutionEdge {
            from: graph[e.source()].clone(),
            to: graph[e.target()].clone(),
            trigger: *e.weight(),
        })
        .filter(|e| include(&e.from) && include(&e.to))
        .collect();
    edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));

    EvolutionGraph { nodes, edges }
}

/// Every version and parent link in the store
pub fn generate_evolution_graph(store: &HypothesisHistoryStore) -> EvolutionGraph {
    build_graph(store, |_| true)
}

/// Ancestors, self and descendants of one version
pub fn generate_lineage_graph(store: &HypothesisHistoryStore, id: &str) -> Result<EvolutionGraph> {
    let mut lineage: HashSet<String> = store.get_ancestors(id)?.into_iter().collect();
    lineage.extend(store.get_descendants(id)?);
    lineage.insert(id.to_string());
    Ok(build_graph(store, |v| lineage.contains(v)))
}

pub fn get_evolution_stats(store: &HypothesisHistoryStore) -> EvolutionStats {
    let mut stats = EvolutionStats {
        total_versions: store.len(),
        root_count: store.roots().len(),
        current_count: store.current().len(),
        abandoned_count: store.abandoned().len(),
        ..Default::default()
    };
    for version in store.versions() {
        *stats.by_trigger.entry(version.trigger).or_insert(0) += 1;
        if version.children.len() > 1 {
            stats.branch_points += 1;
        }
        if let Ok(depth) = store.depth(version.id()) {
            stats.max_depth = stats.max_depth.max(depth);
        }
    }
    stats
}

impl HypothesisHistoryStore {
    pub fn find_by_trigger(&self, trigger: EvolutionTrigger) -> Vec<&HypothesisVersion> {
        self.versions().filter(|v| v.trigger == trigger).collect()
    }

    /// Versions created within `[start, end]`
    pub fn find_by_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<&HypothesisVersion> {
        self.versions()
            .filter(|v| {
                let created = v.hypothesis.created_at;
                created >= start && created <= end
            })
            .collect()
    }
}
