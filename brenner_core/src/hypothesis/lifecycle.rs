//! Hypothesis lifecycle state machine
//!
//! ```text
//!            LOCK_PREDICTION          START_TESTING
//!   draft ─────────────────▶ active ───────────────▶ testing
//!     ▲  ╲                    ▲  │ ╲                 │  │  │
//!     │   ╲ABANDON      RESUME│  │  ╲PAUSE    SUPPORT│  │  │FALSIFICATION
//!     │    ╲                  │  │   ▼               ▼  │  ▼
//!     │     ▼              dormant◀──── supported ◀─┘   │ falsified
//!     │  falsified   REACTIVATE│                        │
//!     └────────────────────────┘      CREATE_SUCCESSOR ─┴─▶ superseded
//! ```
//!
//! `falsified` and `superseded` are terminal. Transitions never mutate their
//! input: a successful transition returns a new value plus the side effects
//! the caller must carry out; a rejected one returns a `TransitionError`
//! naming the guard that failed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LifecycleConfig;

use super::card::HypothesisCard;

/// Reason recorded when a user abandons without giving one
pub const DEFAULT_ABANDON_REASON: &str = "Abandoned by user";

/// Lifecycle state of a hypothesis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisState {
    /// Being written; predictions not yet committed
    Draft,
    /// At least one prediction locked
    Active,
    /// A discriminating test is under way
    Testing,
    /// Survived a test; may be tested again
    Supported,
    /// Dead: a falsification condition was observed or the user gave up
    Falsified,
    /// Replaced by a successor hypothesis
    Superseded,
    /// Parked without activity
    Dormant,
}

impl HypothesisState {
    pub const ALL: [HypothesisState; 7] = [
        HypothesisState::Draft,
        HypothesisState::Active,
        HypothesisState::Testing,
        HypothesisState::Supported,
        HypothesisState::Falsified,
        HypothesisState::Superseded,
        HypothesisState::Dormant,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Testing => "testing",
            Self::Supported => "supported",
            Self::Falsified => "falsified",
            Self::Superseded => "superseded",
            Self::Dormant => "dormant",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Active => "Active",
            Self::Testing => "Under Test",
            Self::Supported => "Supported",
            Self::Falsified => "Falsified",
            Self::Superseded => "Superseded",
            Self::Dormant => "Dormant",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Draft => "Still being formulated; lock a prediction to commit to it",
            Self::Active => "Predictions are committed; design a discriminating test",
            Self::Testing => "A test is running; record whether it supports or falsifies",
            Self::Supported => "Survived testing so far; keep trying to kill it",
            Self::Falsified => "A falsification condition was met; record what was learned",
            Self::Superseded => "Replaced by a refined successor",
            Self::Dormant => "Parked; resume or reactivate to continue",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Falsified | Self::Superseded)
    }
}

impl std::fmt::Display for HypothesisState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event discriminant, independent of payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleEventType {
    LockPrediction,
    StartTesting,
    RecordSupport,
    RecordFalsification,
    CreateSuccessor,
    Pause,
    Resume,
    Reactivate,
    Abandon,
}

impl LifecycleEventType {
    pub const ALL: [LifecycleEventType; 9] = [
        LifecycleEventType::LockPrediction,
        LifecycleEventType::StartTesting,
        LifecycleEventType::RecordSupport,
        LifecycleEventType::RecordFalsification,
        LifecycleEventType::CreateSuccessor,
        LifecycleEventType::Pause,
        LifecycleEventType::Resume,
        LifecycleEventType::Reactivate,
        LifecycleEventType::Abandon,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LockPrediction => "LOCK_PREDICTION",
            Self::StartTesting => "START_TESTING",
            Self::RecordSupport => "RECORD_SUPPORT",
            Self::RecordFalsification => "RECORD_FALSIFICATION",
            Self::CreateSuccessor => "CREATE_SUCCESSOR",
            Self::Pause => "PAUSE",
            Self::Resume => "RESUME",
            Self::Reactivate => "REACTIVATE",
            Self::Abandon => "ABANDON",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == name)
    }

    /// States this event may fire from
    pub fn valid_from(self) -> &'static [HypothesisState] {
        use HypothesisState::*;
        match self {
            Self::LockPrediction => &[Draft, Active],
            Self::StartTesting => &[Active, Supported],
            Self::RecordSupport => &[Testing],
            Self::RecordFalsification => &[Testing],
            Self::CreateSuccessor => &[Active, Testing, Supported],
            Self::Pause => &[Active, Testing, Supported],
            Self::Resume => &[Dormant],
            Self::Reactivate => &[Dormant],
            Self::Abandon => &[Draft, Dormant],
        }
    }

    /// State reached on success
    pub fn target(self) -> HypothesisState {
        match self {
            Self::LockPrediction => HypothesisState::Active,
            Self::StartTesting => HypothesisState::Testing,
            Self::RecordSupport => HypothesisState::Supported,
            Self::RecordFalsification => HypothesisState::Falsified,
            Self::CreateSuccessor => HypothesisState::Superseded,
            Self::Pause => HypothesisState::Dormant,
            Self::Resume => HypothesisState::Active,
            Self::Reactivate => HypothesisState::Draft,
            Self::Abandon => HypothesisState::Falsified,
        }
    }
}

impl std::fmt::Display for LifecycleEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user or agent action against a hypothesis
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleEvent {
    LockPrediction {
        /// Index into if-true predictions followed by if-false predictions
        #[serde(rename = "predictionIndex")]
        prediction_index: usize,
    },
    StartTesting,
    RecordSupport {
        #[serde(default, rename = "evidenceId", skip_serializing_if = "Option::is_none")]
        evidence_id: Option<String>,
    },
    RecordFalsification {
        reason: String,
        #[serde(default, rename = "evidenceId", skip_serializing_if = "Option::is_none")]
        evidence_id: Option<String>,
    },
    CreateSuccessor {
        #[serde(rename = "successorId")]
        successor_id: String,
    },
    Pause {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Resume,
    Reactivate,
    Abandon {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl LifecycleEvent {
    pub fn event_type(&self) -> LifecycleEventType {
        match self {
            Self::LockPrediction { .. } => LifecycleEventType::LockPrediction,
            Self::StartTesting => LifecycleEventType::StartTesting,
            Self::RecordSupport { .. } => LifecycleEventType::RecordSupport,
            Self::RecordFalsification { .. } => LifecycleEventType::RecordFalsification,
            Self::CreateSuccessor { .. } => LifecycleEventType::CreateSuccessor,
            Self::Pause { .. } => LifecycleEventType::Pause,
            Self::Resume => LifecycleEventType::Resume,
            Self::Reactivate => LifecycleEventType::Reactivate,
            Self::Abandon { .. } => LifecycleEventType::Abandon,
        }
    }
}

/// Work the caller must perform after a transition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffect {
    /// Move the hypothesis to the archive (graveyard candidate)
    Archive {
        #[serde(rename = "hypothesisId")]
        hypothesis_id: String,
        reason: String,
        #[serde(default, rename = "evidenceId", skip_serializing_if = "Option::is_none")]
        evidence_id: Option<String>,
    },
    /// Record the predecessor/successor link in the history store
    CreateSuccessorLink {
        #[serde(rename = "fromId")]
        from_id: String,
        #[serde(rename = "successorId")]
        successor_id: String,
    },
}

/// A card plus its lifecycle state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HypothesisWithLifecycle {
    #[serde(flatten)]
    pub card: HypothesisCard,
    pub state: HypothesisState,
    #[serde(with = "crate::timestamp")]
    pub state_entered_at: DateTime<Utc>,
    /// Indices into the combined prediction list that are committed
    #[serde(default)]
    pub locked_predictions: Vec<usize>,
    #[serde(with = "crate::timestamp")]
    pub last_activity_at: DateTime<Utc>,
    pub dormancy_threshold_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub falsification_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successor_id: Option<String>,
}

impl HypothesisWithLifecycle {
    /// Upgrade a plain card into a draft
    pub fn from_card(card: HypothesisCard) -> Self {
        Self::from_card_with_config(card, &LifecycleConfig::default())
    }

    pub fn from_card_with_config(card: HypothesisCard, config: &LifecycleConfig) -> Self {
        let now = Utc::now();
        Self {
            card,
            state: HypothesisState::Draft,
            state_entered_at: now,
            locked_predictions: Vec::new(),
            last_activity_at: now,
            dormancy_threshold_days: config.dormancy_threshold_days,
            falsification_reason: None,
            successor_id: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.card.id
    }

    pub fn is_locked(&self, prediction_index: usize) -> bool {
        self.locked_predictions.contains(&prediction_index)
    }

    /// Locked prediction texts, in lock order
    pub fn locked_prediction_texts(&self) -> Vec<&str> {
        let all: Vec<&String> = self.card.all_predictions().collect();
        self.locked_predictions
            .iter()
            .filter_map(|&i| all.get(i).map(|s| s.as_str()))
            .collect()
    }

    /// Whole days spent in the current state
    pub fn days_in_state(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.state_entered_at)
            .num_days()
            .max(0)
    }

    /// Copy with activity recorded at `now`, state unchanged
    pub fn touched(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.last_activity_at = now;
        next
    }
}

/// Why a transition was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Cannot {event} from state '{from}'{}", hint_suffix(.hint))]
    InvalidTransition {
        event: LifecycleEventType,
        from: HypothesisState,
        hint: Option<&'static str>,
    },

    #[error("Invalid prediction index: {index} (hypothesis has {available} predictions)")]
    InvalidPredictionIndex { index: usize, available: usize },

    #[error("Prediction {0} is already locked")]
    PredictionAlreadyLocked(usize),

    #[error("Cannot start testing: must lock at least one prediction first")]
    NoLockedPredictions,

    #[error("Cannot start testing: must define at least one falsification condition first")]
    NoFalsificationConditions,

    #[error("Unknown event type: {0}")]
    UnknownEvent(String),

    #[error("Malformed {event} event: {message}")]
    MalformedEvent { event: String, message: String },
}

fn hint_suffix(hint: &Option<&'static str>) -> String {
    match hint {
        Some(h) => format!(" ({})", h),
        None => String::new(),
    }
}

/// Successful transition
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionSuccess {
    pub hypothesis: HypothesisWithLifecycle,
    pub from: HypothesisState,
    pub to: HypothesisState,
    pub side_effects: Vec<SideEffect>,
}

pub type TransitionResult = std::result::Result<TransitionSuccess, TransitionError>;

fn state_hint(event: LifecycleEventType, from: HypothesisState) -> Option<&'static str> {
    match (event, from) {
        (LifecycleEventType::StartTesting, HypothesisState::Draft) => {
            Some("must lock at least one prediction first")
        }
        (LifecycleEventType::RecordSupport | LifecycleEventType::RecordFalsification, _) => {
            Some("start testing first")
        }
        (_, state) if state.is_terminal() => Some("terminal state"),
        _ => None,
    }
}

fn check_state(h: &HypothesisWithLifecycle, event: LifecycleEventType) -> Result<(), TransitionError> {
    if event.valid_from().contains(&h.state) {
        Ok(())
    } else {
        Err(TransitionError::InvalidTransition {
            event,
            from: h.state,
            hint: state_hint(event, h.state),
        })
    }
}

fn check_guard(h: &HypothesisWithLifecycle, event: &LifecycleEvent) -> Result<(), TransitionError> {
    match event {
        LifecycleEvent::LockPrediction { prediction_index } => {
            let available = h.card.prediction_count();
            if *prediction_index >= available {
                return Err(TransitionError::InvalidPredictionIndex {
                    index: *prediction_index,
                    available,
                });
            }
            if h.is_locked(*prediction_index) {
                return Err(TransitionError::PredictionAlreadyLocked(*prediction_index));
            }
            Ok(())
        }
        LifecycleEvent::StartTesting => {
            if h.locked_predictions.is_empty() {
                return Err(TransitionError::NoLockedPredictions);
            }
            if h.card.impossible_if_true.is_empty() {
                return Err(TransitionError::NoFalsificationConditions);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Apply an event at the current time
pub fn transition_hypothesis(h: &HypothesisWithLifecycle, event: &LifecycleEvent) -> TransitionResult {
    transition_hypothesis_at(h, event, Utc::now())
}

/// Apply an event with an explicit clock
pub fn transition_hypothesis_at(
    h: &HypothesisWithLifecycle,
    event: &LifecycleEvent,
    now: DateTime<Utc>,
) -> TransitionResult {
    let event_type = event.event_type();
    if let Err(e) = check_state(h, event_type).and_then(|_| check_guard(h, event)) {
        tracing::debug!("Rejected {} on {}: {}", event_type, h.id(), e);
        return Err(e);
    }

    let mut next = h.clone();
    let mut side_effects = Vec::new();

    match event {
        LifecycleEvent::LockPrediction { prediction_index } => {
            next.locked_predictions.push(*prediction_index);
        }
        LifecycleEvent::RecordFalsification {
            reason,
            evidence_id,
        } => {
            next.falsification_reason = Some(reason.clone());
            side_effects.push(SideEffect::Archive {
                hypothesis_id: h.card.id.clone(),
                reason: reason.clone(),
                evidence_id: evidence_id.clone(),
            });
        }
        LifecycleEvent::CreateSuccessor { successor_id } => {
            next.successor_id = Some(successor_id.clone());
            side_effects.push(SideEffect::CreateSuccessorLink {
                from_id: h.card.id.clone(),
                successor_id: successor_id.clone(),
            });
        }
        LifecycleEvent::Reactivate => {
            next.locked_predictions.clear();
            next.successor_id = None;
            next.falsification_reason = None;
        }
        LifecycleEvent::Abandon { reason } => {
            let reason = reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or(DEFAULT_ABANDON_REASON);
            next.falsification_reason = Some(reason.to_string());
        }
        LifecycleEvent::StartTesting
        | LifecycleEvent::RecordSupport { .. }
        | LifecycleEvent::Pause { .. }
        | LifecycleEvent::Resume => {}
    }

    next.state = event_type.target();
    next.state_entered_at = now;
    next.last_activity_at = now;
    next.card.updated_at = now;

    tracing::debug!(
        "Hypothesis {} {} -> {} via {}",
        h.id(),
        h.state,
        next.state,
        event_type
    );

    Ok(TransitionSuccess {
        from: h.state,
        to: next.state,
        hypothesis: next,
        side_effects,
    })
}

/// Apply an untyped event as sent by a UI layer
pub fn transition_hypothesis_json(
    h: &HypothesisWithLifecycle,
    event: &serde_json::Value,
) -> TransitionResult {
    let event = parse_event(event)?;
    transition_hypothesis(h, &event)
}

/// Decode an untyped event, separating unknown types from malformed payloads
pub fn parse_event(value: &serde_json::Value) -> Result<LifecycleEvent, TransitionError> {
    let name = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| TransitionError::UnknownEvent("<missing>".to_string()))?;
    if LifecycleEventType::parse(name).is_none() {
        return Err(TransitionError::UnknownEvent(name.to_string()));
    }
    serde_json::from_value(value.clone()).map_err(|e| TransitionError::MalformedEvent {
        event: name.to_string(),
        message: e.to_string(),
    })
}

/// Events valid from the current state, ignoring event-specific guards
pub fn get_available_transitions(h: &HypothesisWithLifecycle) -> Vec<LifecycleEventType> {
    LifecycleEventType::ALL
        .into_iter()
        .filter(|e| e.valid_from().contains(&h.state))
        .collect()
}

/// State-only check
pub fn can_transition(h: &HypothesisWithLifecycle, event: LifecycleEventType) -> bool {
    check_state(h, event).is_ok()
}

/// State check plus the event's guard
pub fn can_transition_with_event(h: &HypothesisWithLifecycle, event: &LifecycleEvent) -> bool {
    check_state(h, event.event_type()).is_ok() && check_guard(h, event).is_ok()
}

pub fn is_terminal_state(state: HypothesisState) -> bool {
    state.is_terminal()
}

/// Can still reach a terminal state through the normal testing flow
///
/// Dormant hypotheses are parked and do not count, even though
/// RESUME would make them resolvable again.
pub fn is_resolvable(state: HypothesisState) -> bool {
    !state.is_terminal() && state != HypothesisState::Dormant
}

/// Active and idle for longer than its dormancy threshold
pub fn should_be_dormant(h: &HypothesisWithLifecycle, now: DateTime<Utc>) -> bool {
    h.state == HypothesisState::Active
        && now.signed_duration_since(h.last_activity_at)
            > Duration::days(i64::from(h.dormancy_threshold_days))
}
