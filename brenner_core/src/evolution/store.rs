//! History store backed by a parent -> child graph

use std::collections::{HashMap, VecDeque};

use indexmap::{IndexMap, IndexSet};
use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::errors::{BrennerError, Result};
use crate::hypothesis::card::{ensure_valid, evolve_to_version};
use crate::hypothesis::{HypothesisCard, HypothesisCardChanges};
use crate::ids::parse_hypothesis_card_id;

use super::{EvolutionTrigger, HypothesisVersion};

const ROOT_MESSAGE: &str = "Initial hypothesis";

/// Parameters for one evolution step
#[derive(Clone, Debug)]
pub struct Evolution {
    pub changes: HypothesisCardChanges,
    pub trigger: EvolutionTrigger,
    /// Also becomes the new card's `evolution_reason`
    pub message: String,
    pub created_by: Option<String>,
    pub related_entity_id: Option<String>,
}

impl Evolution {
    pub fn new(trigger: EvolutionTrigger, message: impl Into<String>) -> Self {
        Self {
            changes: HypothesisCardChanges::default(),
            trigger,
            message: message.into(),
            created_by: None,
            related_entity_id: None,
        }
    }

    pub fn with_changes(mut self, changes: HypothesisCardChanges) -> Self {
        self.changes = changes;
        self
    }

    pub fn created_by(mut self, who: impl Into<String>) -> Self {
        self.created_by = Some(who.into());
        self
    }

    pub fn related_to(mut self, entity_id: impl Into<String>) -> Self {
        self.related_entity_id = Some(entity_id.into());
        self
    }
}

/// Persisted shape of the store
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStoreRecord {
    versions: IndexMap<String, HypothesisVersion>,
    #[serde(default)]
    roots: Vec<String>,
    #[serde(default)]
    current: Vec<String>,
    #[serde(default)]
    abandoned: Vec<String>,
}

/// Append-only version history
///
/// Edge direction: parent -> child. Children lists on the versions mirror
/// the graph edges and are only touched by the mutation methods here.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "HistoryStoreRecord", into = "HistoryStoreRecord")]
pub struct HypothesisHistoryStore {
    versions: IndexMap<String, HypothesisVersion>,
    graph: DiGraph<String, EvolutionTrigger>,
    node_indices: HashMap<String, NodeIndex>,
    roots: IndexSet<String>,
    current: IndexSet<String>,
    abandoned: IndexSet<String>,
}

impl PartialEq for HypothesisHistoryStore {
    fn eq(&self, other: &Self) -> bool {
        self.versions == other.versions
            && self.roots == other.roots
            && self.current == other.current
            && self.abandoned == other.abandoned
    }
}

fn not_found(id: &str) -> BrennerError {
    BrennerError::NotFound(format!("Hypothesis version not found: {}", id))
}

impl HypothesisHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.versions.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&HypothesisVersion> {
        self.versions.get(id)
    }

    /// All versions in insertion order
    pub fn versions(&self) -> impl Iterator<Item = &HypothesisVersion> {
        self.versions.values()
    }

    pub fn roots(&self) -> &IndexSet<String> {
        &self.roots
    }

    /// Live versions: tips of lineages that have not been abandoned
    pub fn current(&self) -> &IndexSet<String> {
        &self.current
    }

    pub fn abandoned(&self) -> &IndexSet<String> {
        &self.abandoned
    }

    pub fn is_current(&self, id: &str) -> bool {
        self.current.contains(id)
    }

    pub fn is_abandoned(&self, id: &str) -> bool {
        self.abandoned.contains(id)
    }

    fn require(&self, id: &str) -> Result<&HypothesisVersion> {
        self.versions.get(id).ok_or_else(|| not_found(id))
    }

    pub(super) fn graph(&self) -> &DiGraph<String, EvolutionTrigger> {
        &self.graph
    }

    fn insert_version(&mut self, version: HypothesisVersion) {
        let id = version.id().to_string();
        let idx = self.graph.add_node(id.clone());
        self.node_indices.insert(id.clone(), idx);
        if let Some(parent_idx) = version
            .parent_id
            .as_deref()
            .and_then(|p| self.node_indices.get(p))
        {
            self.graph.add_edge(*parent_idx, idx, version.trigger);
        }
        self.versions.insert(id, version);
    }

    /// Start a new lineage
    ///
    /// # Errors
    /// - `BrennerError::Validation` if the card is invalid
    /// - `BrennerError::AlreadyExists` if the id is already recorded
    pub fn add_root_hypothesis(
        &mut self,
        card: HypothesisCard,
        created_by: Option<&str>,
    ) -> Result<&HypothesisVersion> {
        ensure_valid(&card)?;
        if self.contains(&card.id) {
            return Err(BrennerError::AlreadyExists(format!(
                "Hypothesis version already exists: {}",
                card.id
            )));
        }

        let id = card.id.clone();
        self.insert_version(HypothesisVersion {
            hypothesis: card,
            parent_id: None,
            children: Vec::new(),
            trigger: EvolutionTrigger::Manual,
            message: ROOT_MESSAGE.to_string(),
            created_by: created_by.map(str::to_string),
            related_entity_id: None,
        });
        self.roots.insert(id.clone());
        self.current.insert(id.clone());

        tracing::debug!("Added root hypothesis {}", id);
        Ok(&self.versions[&id])
    }

    /// Highest recorded version for a card base, plus one
    fn next_version_for(&self, base: &str) -> Result<u32> {
        let highest = self
            .versions
            .keys()
            .filter_map(|id| parse_hypothesis_card_id(id).ok())
            .filter(|parts| parts.base == base)
            .map(|parts| parts.version)
            .max()
            .unwrap_or(0);
        highest
            .checked_add(1)
            .ok_or_else(|| BrennerError::InvalidId(format!("No version after {}-v{}", base, highest)))
    }

    /// Derive a child version from `parent_id`
    ///
    /// A parent that already has children branches: the new child gets the
    /// next version number not yet used by its lineage. The parent leaves the
    /// `current` set and the child joins it.
    pub fn evolve_hypothesis(
        &mut self,
        parent_id: &str,
        evolution: Evolution,
    ) -> Result<&HypothesisVersion> {
        let parent = self.require(parent_id)?;
        let parts = parse_hypothesis_card_id(parent_id)?;
        let next_version = self.next_version_for(&parts.base)?;

        let Evolution {
            changes,
            trigger,
            message,
            created_by,
            related_entity_id,
        } = evolution;

        let card = evolve_to_version(
            &parent.hypothesis,
            changes,
            &message,
            created_by.as_deref(),
            next_version,
        )?;
        let id = card.id.clone();
        if self.contains(&id) {
            return Err(BrennerError::AlreadyExists(format!(
                "Hypothesis version already exists: {}",
                id
            )));
        }

        self.insert_version(HypothesisVersion {
            hypothesis: card,
            parent_id: Some(parent_id.to_string()),
            children: Vec::new(),
            trigger,
            message: message.trim().to_string(),
            created_by,
            related_entity_id,
        });
        if let Some(parent) = self.versions.get_mut(parent_id) {
            parent.children.push(id.clone());
        }
        self.current.shift_remove(parent_id);
        self.current.insert(id.clone());

        tracing::debug!("Evolved {} -> {} ({})", parent_id, id, trigger);
        Ok(&self.versions[&id])
    }

    /// Move a version out of `current` into `abandoned`
    pub fn abandon_hypothesis(&mut self, id: &str) -> Result<()> {
        self.require(id)?;
        self.current.shift_remove(id);
        self.abandoned.insert(id.to_string());
        tracing::debug!("Abandoned hypothesis version {}", id);
        Ok(())
    }

    /// Parent chain from nearest to root, excluding `id`
    pub fn get_ancestors(&self, id: &str) -> Result<Vec<String>> {
        let mut ancestors = Vec::new();
        let mut cursor = self.require(id)?.parent_id.as_deref();
        while let Some(parent_id) = cursor {
            ancestors.push(parent_id.to_string());
            cursor = self
                .versions
                .get(parent_id)
                .and_then(|v| v.parent_id.as_deref());
        }
        Ok(ancestors)
    }

    /// Breadth-first descendants, excluding `id`
    pub fn get_descendants(&self, id: &str) -> Result<Vec<String>> {
        let start = self.require(id)?;
        let mut descendants = Vec::new();
        let mut queue: VecDeque<&str> = start.children.iter().map(String::as_str).collect();
        while let Some(next) = queue.pop_front() {
            descendants.push(next.to_string());
            if let Some(v) = self.versions.get(next) {
                queue.extend(v.children.iter().map(String::as_str));
            }
        }
        Ok(descendants)
    }

    pub fn get_root(&self, id: &str) -> Result<String> {
        let ancestors = self.get_ancestors(id)?;
        Ok(ancestors.last().cloned().unwrap_or_else(|| id.to_string()))
    }

    /// Childless versions reachable from `root_id` (itself included)
    pub fn get_leaves(&self, root_id: &str) -> Result<Vec<String>> {
        let mut reachable = vec![root_id.to_string()];
        reachable.extend(self.get_descendants(root_id)?);
        Ok(reachable
            .into_iter()
            .filter(|id| self.versions.get(id).is_some_and(|v| v.children.is_empty()))
            .collect())
    }

    /// Self-inclusive chain up to the root
    fn lineage_chain<'a>(&'a self, id: &'a str) -> Option<Vec<&'a str>> {
        let mut chain = vec![id];
        let mut cursor = self.versions.get(id)?.parent_id.as_deref();
        while let Some(parent_id) = cursor {
            chain.push(parent_id);
            cursor = self
                .versions
                .get(parent_id)
                .and_then(|v| v.parent_id.as_deref());
        }
        Some(chain)
    }

    /// Nearest version on both self-inclusive ancestor chains
    pub fn find_common_ancestor(&self, a: &str, b: &str) -> Option<String> {
        let chain_b: IndexSet<&str> = self.lineage_chain(b)?.into_iter().collect();
        self.lineage_chain(a)?
            .into_iter()
            .find(|id| chain_b.contains(id))
            .map(str::to_string)
    }

    /// Strict: a version is never its own ancestor
    pub fn is_ancestor(&self, maybe_ancestor: &str, id: &str) -> bool {
        if maybe_ancestor == id {
            return false;
        }
        match (self.node_indices.get(maybe_ancestor), self.node_indices.get(id)) {
            (Some(&from), Some(&to)) => has_path_connecting(&self.graph, from, to, None),
            _ => false,
        }
    }

    /// Number of ancestors
    pub fn depth(&self, id: &str) -> Result<usize> {
        Ok(self.get_ancestors(id)?.len())
    }
}

fn inconsistent(message: String) -> BrennerError {
    BrennerError::InvalidState(format!("Inconsistent history store: {}", message))
}

impl TryFrom<HistoryStoreRecord> for HypothesisHistoryStore {
    type Error = BrennerError;

    fn try_from(record: HistoryStoreRecord) -> Result<Self> {
        let HistoryStoreRecord {
            versions,
            roots,
            current,
            abandoned,
        } = record;

        let mut expected_children: HashMap<&str, IndexSet<&str>> = HashMap::new();
        for (key, version) in &versions {
            if key != version.id() {
                return Err(inconsistent(format!(
                    "key {} does not match card id {}",
                    key,
                    version.id()
                )));
            }
            match version.parent_id.as_deref() {
                Some(parent) if !versions.contains_key(parent) => {
                    return Err(inconsistent(format!(
                        "parent {} of {} is missing",
                        parent, key
                    )));
                }
                Some(parent) => {
                    expected_children.entry(parent).or_default().insert(key);
                }
                None if !roots.contains(key) => {
                    return Err(inconsistent(format!("{} has no parent but is not a root", key)));
                }
                None => {}
            }
        }

        for (key, version) in &versions {
            let listed: IndexSet<&str> = version.children.iter().map(String::as_str).collect();
            let expected = expected_children.remove(key.as_str()).unwrap_or_default();
            if listed.len() != version.children.len() || listed != expected {
                return Err(inconsistent(format!(
                    "children of {} disagree with parent links",
                    key
                )));
            }
        }

        for id in &roots {
            match versions.get(id) {
                Some(v) if v.is_root() => {}
                Some(_) => return Err(inconsistent(format!("root {} has a parent", id))),
                None => return Err(inconsistent(format!("root {} is missing", id))),
            }
        }
        if let Some(id) = current
            .iter()
            .chain(abandoned.iter())
            .find(|id| !versions.contains_key(id.as_str()))
        {
            return Err(inconsistent(format!("unknown version {}", id)));
        }

        let mut store = HypothesisHistoryStore {
            roots: roots.into_iter().collect(),
            current: current.into_iter().collect(),
            abandoned: abandoned.into_iter().collect(),
            ..Default::default()
        };
        for id in versions.keys() {
            let idx = store.graph.add_node(id.clone());
            store.node_indices.insert(id.clone(), idx);
        }
        for version in versions.values() {
            if let Some(parent) = version.parent_id.as_deref() {
                let from = store.node_indices[parent];
                let to = store.node_indices[version.id()];
                store.graph.add_edge(from, to, version.trigger);
            }
        }
        if is_cyclic_directed(&store.graph) {
            return Err(inconsistent("parent links form a cycle".to_string()));
        }
        store.versions = versions;
        Ok(store)
    }
}

impl From<HypothesisHistoryStore> for HistoryStoreRecord {
    fn from(store: HypothesisHistoryStore) -> Self {
        Self {
            versions: store.versions,
            roots: store.roots.into_iter().collect(),
            current: store.current.into_iter().collect(),
            abandoned: store.abandoned.into_iter().collect(),
        }
    }
}
