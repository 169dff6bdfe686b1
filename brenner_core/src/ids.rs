//! Identifier formats
//!
//! Session-scoped records use `{PREFIX}-{sessionId}-{seq:3}` ids, hypothesis
//! cards append a `-v{version}` suffix. Arena records use random UUIDs.
//! These strings are persisted and parsed back, so the formats are fixed.

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::errors::{BrennerError, Result};

/// Largest sequence number representable in three digits
pub const MAX_SEQUENCE: u32 = 999;

pub const HYPOTHESIS_CARD_PREFIX: &str = "HC";
pub const EVIDENCE_PREFIX: &str = "EV";
pub const GRAVEYARD_PREFIX: &str = "GY";
pub const ARENA_PREFIX: &str = "ARENA";
pub const TEST_RESULT_PREFIX: &str = "TR";
pub const ARENA_TEST_PREFIX: &str = "AT";

fn session_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]*$").expect("static regex"))
}

fn card_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(HC-[A-Za-z0-9][A-Za-z0-9-]*-\d{3})-v(\d+)$").expect("static regex")
    })
}

/// Check a session id against `^[A-Za-z0-9][A-Za-z0-9-]*$`
pub fn is_valid_session_id(session_id: &str) -> bool {
    session_id_pattern().is_match(session_id)
}

fn session_scoped_id(prefix: &str, session_id: &str, sequence: u32) -> Result<String> {
    if !is_valid_session_id(session_id) {
        return Err(BrennerError::InvalidId(format!(
            "Invalid sessionId: {:?}",
            session_id
        )));
    }
    if sequence > MAX_SEQUENCE {
        return Err(BrennerError::InvalidId(format!(
            "Invalid sequence: {} (must be 0-{})",
            sequence, MAX_SEQUENCE
        )));
    }
    Ok(format!("{}-{}-{:03}", prefix, session_id, sequence))
}

/// `HC-{sessionId}-{seq:3}-v{version}`
pub fn generate_hypothesis_card_id(session_id: &str, sequence: u32, version: u32) -> Result<String> {
    if version == 0 {
        return Err(BrennerError::InvalidId(
            "Invalid version: 0 (must be positive)".to_string(),
        ));
    }
    let base = session_scoped_id(HYPOTHESIS_CARD_PREFIX, session_id, sequence)?;
    Ok(format!("{}-v{}", base, version))
}

/// Parsed form of a hypothesis card id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardIdParts {
    /// Everything before the `-v{version}` suffix
    pub base: String,
    pub version: u32,
}

impl CardIdParts {
    pub fn with_version(&self, version: u32) -> String {
        format!("{}-v{}", self.base, version)
    }
}

/// Split a hypothesis card id into base and version
pub fn parse_hypothesis_card_id(id: &str) -> Result<CardIdParts> {
    let captures = card_id_pattern()
        .captures(id)
        .ok_or_else(|| BrennerError::InvalidId(format!("Invalid hypothesis card id: {:?}", id)))?;
    let version = captures[2]
        .parse::<u32>()
        .map_err(|_| BrennerError::InvalidId(format!("Invalid hypothesis card id: {:?}", id)))?;
    if version == 0 {
        return Err(BrennerError::InvalidId(format!(
            "Invalid hypothesis card id: {:?}",
            id
        )));
    }
    Ok(CardIdParts {
        base: captures[1].to_string(),
        version,
    })
}

/// `EV-{sessionId}-{seq:3}`
pub fn generate_evidence_id(session_id: &str, sequence: u32) -> Result<String> {
    session_scoped_id(EVIDENCE_PREFIX, session_id, sequence)
}

/// `GY-{sessionId}-{seq:3}`
pub fn generate_graveyard_id(session_id: &str, sequence: u32) -> Result<String> {
    session_scoped_id(GRAVEYARD_PREFIX, session_id, sequence)
}

/// Check a `{prefix}-{sessionId}-{seq:3}` id
pub fn is_session_scoped_id(prefix: &str, id: &str) -> bool {
    let Some(rest) = id.strip_prefix(prefix).and_then(|r| r.strip_prefix('-')) else {
        return false;
    };
    match rest.rsplit_once('-') {
        Some((session, seq)) => {
            is_valid_session_id(session)
                && seq.len() == 3
                && seq.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

pub fn generate_arena_id() -> String {
    format!("{}-{}", ARENA_PREFIX, Uuid::new_v4())
}

pub fn generate_arena_test_id() -> String {
    format!("{}-{}", ARENA_TEST_PREFIX, Uuid::new_v4())
}

pub fn generate_test_result_id() -> String {
    format!("{}-{}", TEST_RESULT_PREFIX, Uuid::new_v4())
}
