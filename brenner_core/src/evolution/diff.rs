//! Field-level comparison of two card versions

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hypothesis::HypothesisCard;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

/// One differing field, with JSON snapshots of both sides
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field: &'static str,
    pub change_type: ChangeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn compare<T: PartialEq + Serialize>(
    changes: &mut Vec<FieldChange>,
    field: &'static str,
    before: &T,
    after: &T,
) {
    if before == after {
        return;
    }
    let before = serde_json::to_value(before).unwrap_or(Value::Null);
    let after = serde_json::to_value(after).unwrap_or(Value::Null);
    let change_type = match (is_blank(&before), is_blank(&after)) {
        (true, false) => ChangeType::Added,
        (false, true) => ChangeType::Removed,
        _ => ChangeType::Modified,
    };
    changes.push(FieldChange {
        field,
        change_type,
        before: Some(before).filter(|v| !is_blank(v)),
        after: Some(after).filter(|v| !is_blank(v)),
    });
}

/// Content fields that differ between `a` and `b`
///
/// Identity and bookkeeping fields (id, version, parent link, timestamps)
/// always differ between versions and are not reported.
pub fn diff_hypotheses(a: &HypothesisCard, b: &HypothesisCard) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    compare(&mut changes, "statement", &a.statement, &b.statement);
    compare(&mut changes, "mechanism", &a.mechanism, &b.mechanism);
    compare(&mut changes, "domain", &a.domain, &b.domain);
    compare(
        &mut changes,
        "predictionsIfTrue",
        &a.predictions_if_true,
        &b.predictions_if_true,
    );
    compare(
        &mut changes,
        "predictionsIfFalse",
        &a.predictions_if_false,
        &b.predictions_if_false,
    );
    compare(
        &mut changes,
        "impossibleIfTrue",
        &a.impossible_if_true,
        &b.impossible_if_true,
    );
    compare(&mut changes, "confounds", &a.confounds, &b.confounds);
    compare(&mut changes, "assumptions", &a.assumptions, &b.assumptions);
    compare(&mut changes, "confidence", &a.confidence, &b.confidence);
    compare(&mut changes, "notes", &a.notes, &b.notes);
    changes
}
