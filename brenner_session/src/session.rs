//! Session record persisted by the storage backends
//!
//! A session bundles everything one research question accumulates: the
//! working hypotheses with their lifecycle, the version history, the
//! evidence ledger, arenas and the graveyard.

use brenner_core::ids::is_valid_session_id;
use brenner_core::{
    EvidenceEntry, FalsifiedHypothesis, HypothesisArena, HypothesisHistoryStore,
    HypothesisWithLifecycle,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, StorageError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub research_question: String,
    #[serde(with = "brenner_core::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "brenner_core::timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub hypotheses: Vec<HypothesisWithLifecycle>,
    #[serde(default)]
    pub history: HypothesisHistoryStore,
    #[serde(default)]
    pub evidence: Vec<EvidenceEntry>,
    #[serde(default)]
    pub arenas: Vec<HypothesisArena>,
    #[serde(default)]
    pub graveyard: Vec<FalsifiedHypothesis>,
}

impl Session {
    pub fn new(id: impl Into<String>, research_question: impl Into<String>) -> Result<Self> {
        let id = id.into();
        ensure_session_id(&id)?;
        let now = Utc::now();
        Ok(Self {
            id,
            research_question: research_question.into(),
            created_at: now,
            updated_at: now,
            hypotheses: Vec::new(),
            history: HypothesisHistoryStore::new(),
            evidence: Vec::new(),
            arenas: Vec::new(),
            graveyard: Vec::new(),
        })
    }

    /// Bump `updated_at`
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn hypothesis(&self, id: &str) -> Option<&HypothesisWithLifecycle> {
        self.hypotheses.iter().find(|h| h.id() == id)
    }

    /// Replace the hypothesis with the same id, or append it
    pub fn upsert_hypothesis(&mut self, hypothesis: HypothesisWithLifecycle) {
        match self.hypotheses.iter_mut().find(|h| h.id() == hypothesis.id()) {
            Some(slot) => *slot = hypothesis,
            None => self.hypotheses.push(hypothesis),
        }
        self.touch();
    }

    pub fn record_evidence(&mut self, entry: EvidenceEntry) {
        self.evidence.push(entry);
        self.touch();
    }

    pub fn evidence_for<'a>(
        &'a self,
        hypothesis_id: &'a str,
    ) -> impl Iterator<Item = &'a EvidenceEntry> + 'a {
        self.evidence
            .iter()
            .filter(move |e| e.hypothesis_version == hypothesis_id)
    }

    pub fn bury(&mut self, entry: FalsifiedHypothesis) {
        self.graveyard.push(entry);
        self.touch();
    }

    /// Next sequence number for a new card in this session
    ///
    /// Counts distinct base ids in the history, so evolved versions do not
    /// consume a sequence.
    pub fn next_hypothesis_sequence(&self) -> u32 {
        let roots = self.history.roots().len();
        let loose = self
            .hypotheses
            .iter()
            .filter(|h| !self.history.contains(h.id()))
            .count();
        (roots + loose) as u32 + 1
    }

    pub fn next_evidence_sequence(&self) -> u32 {
        self.evidence.len() as u32 + 1
    }

    pub fn next_graveyard_sequence(&self) -> u32 {
        self.graveyard.len() as u32 + 1
    }
}

pub(crate) fn ensure_session_id(id: &str) -> Result<()> {
    if is_valid_session_id(id) {
        Ok(())
    } else {
        Err(StorageError::InvalidSessionId(id.to_string()))
    }
}
