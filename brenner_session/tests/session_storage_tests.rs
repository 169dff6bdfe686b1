//! Integration tests for session storage backends

use std::sync::Arc;
use std::time::Duration;

use brenner_core::hypothesis::{
    EvidenceEntryInput, HypothesisCardInput, TestDescription, TestPower, TestType,
};
use brenner_core::{
    compute_confidence_update, create_evidence_entry, create_hypothesis_card,
    transition_hypothesis, HypothesisState, HypothesisWithLifecycle, LifecycleEvent, TestResult,
};
use brenner_session::*;
use tempfile::tempdir;

fn working_session(id: &str) -> Session {
    let mut session = Session::new(id, "Why do mutant cells arrest in G2?").unwrap();
    let card = create_hypothesis_card(HypothesisCardInput {
        session_id: id.to_string(),
        sequence: session.next_hypothesis_sequence(),
        statement: "Unrepaired DNA damage holds cells at the G2 checkpoint".to_string(),
        mechanism: "Damage signalling keeps CDK1 inhibited".to_string(),
        domain: vec!["cell biology".to_string()],
        predictions_if_true: vec!["Checkpoint inhibitors release the arrest".to_string()],
        predictions_if_false: vec!["Arrest persists with the checkpoint disabled".to_string()],
        impossible_if_true: vec!["Arrest without any damage markers".to_string()],
        confidence: Some(55.0),
        ..Default::default()
    })
    .unwrap();
    session
        .history
        .add_root_hypothesis(card.clone(), Some("researcher"))
        .unwrap();
    session.upsert_hypothesis(HypothesisWithLifecycle::from_card(card));
    session
}

/// Lock, test and record one supporting result
fn advance(session: &mut Session) {
    let id = session.hypotheses[0].id().to_string();
    let h = session.hypothesis(&id).unwrap().clone();
    let h = transition_hypothesis(&h, &LifecycleEvent::LockPrediction { prediction_index: 0 })
        .unwrap()
        .hypothesis;
    let mut h = transition_hypothesis(&h, &LifecycleEvent::StartTesting)
        .unwrap()
        .hypothesis;

    let update = compute_confidence_update(h.card.confidence, &TestPower::new(4), TestResult::Supports);
    let entry = create_evidence_entry(EvidenceEntryInput {
        session_id: session.id.clone(),
        sequence: session.next_evidence_sequence(),
        hypothesis_version: id.clone(),
        test: TestDescription {
            id: "T-1".to_string(),
            description: "Add a checkpoint kinase inhibitor".to_string(),
            test_type: TestType::Experiment,
            discriminative_power: 4,
        },
        prediction_if_true: "Cells enter mitosis".to_string(),
        prediction_if_false: "Cells stay in G2".to_string(),
        observation: "Most cells entered mitosis within an hour".to_string(),
        result: TestResult::Supports,
        confidence_before: update.previous_confidence,
        confidence_after: update.new_confidence,
        interpretation: "Arrest depends on checkpoint signalling".to_string(),
        source: None,
        notes: None,
        recorded_by: None,
    })
    .unwrap();
    h.card.confidence = update.new_confidence;

    let h = transition_hypothesis(
        &h,
        &LifecycleEvent::RecordSupport {
            evidence_id: Some(entry.id.clone()),
        },
    )
    .unwrap()
    .hypothesis;
    session.record_evidence(entry);
    session.upsert_hypothesis(h);
}

#[tokio::test]
async fn test_file_storage_resumes_session() {
    let dir = tempdir().unwrap();
    let storage = create_storage(&StorageConfig::file(dir.path()));

    let mut session = working_session("G2-ARREST");
    advance(&mut session);
    storage.save(&session).await.unwrap();

    // a fresh backend over the same directory sees the same session
    let reopened = FileSessionStorage::new(dir.path());
    let loaded = reopened.load("G2-ARREST").await.unwrap().unwrap();
    assert_eq!(loaded, session);

    let h = &loaded.hypotheses[0];
    assert_eq!(h.state, HypothesisState::Supported);
    assert_eq!(h.locked_predictions, vec![0]);
    assert_eq!(loaded.evidence_for(h.id()).count(), 1);
    assert!(h.card.confidence > 55.0);
}

#[tokio::test]
async fn test_list_orders_by_update_time() {
    let storage = InMemorySessionStorage::new();
    let mut first = working_session("S-1");
    let mut second = working_session("S-2");
    first.updated_at = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    second.updated_at = chrono::DateTime::from_timestamp(1_700_000_100, 0).unwrap();
    storage.save(&first).await.unwrap();
    storage.save(&second).await.unwrap();

    let ids: Vec<String> = storage
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec!["S-2", "S-1"]);
}

#[tokio::test]
async fn test_backends_agree_on_errors() {
    let dir = tempdir().unwrap();
    let backends: Vec<Arc<dyn SessionStorage>> = vec![
        create_storage(&StorageConfig::in_memory()),
        create_storage(&StorageConfig::file(dir.path())),
    ];

    for storage in backends {
        assert!(storage.load("MISSING").await.unwrap().is_none());
        assert_eq!(
            storage.delete("MISSING").await.unwrap_err().code(),
            "SESSION_NOT_FOUND"
        );

        for bad_id in ["../x", "a/b", ""] {
            assert_eq!(
                storage.load(bad_id).await.unwrap_err().code(),
                "INVALID_SESSION_ID"
            );
            assert_eq!(
                storage.delete(bad_id).await.unwrap_err().code(),
                "INVALID_SESSION_ID"
            );
        }

        let mut bad = working_session("OK");
        bad.id = "has space".to_string();
        assert_eq!(
            storage.save(&bad).await.unwrap_err().code(),
            "INVALID_SESSION_ID"
        );

        storage.save(&working_session("OK")).await.unwrap();
        storage.clear().await.unwrap();
        assert!(storage.list().await.unwrap().is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn test_autosave_keeps_newest_snapshot() {
    let config = StorageConfig::in_memory().with_debounce(Duration::from_millis(500));
    let storage = create_storage(&config);
    let mut events = storage.subscribe();
    let saver = DebouncedSaver::spawn(storage.clone(), config.debounce);

    let mut session = working_session("AUTO-1");
    saver.mark_dirty(session.clone());
    tokio::time::sleep(Duration::from_millis(200)).await;

    advance(&mut session);
    saver.mark_dirty(session.clone());
    tokio::time::sleep(Duration::from_secs(1)).await;

    let saved = storage.load("AUTO-1").await.unwrap().unwrap();
    assert_eq!(saved.hypotheses[0].state, HypothesisState::Supported);

    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, StorageEventKind::Save);
    assert_eq!(event.session_id.as_deref(), Some("AUTO-1"));
    assert!(events.try_recv().is_err());

    saver.flush().await;
}
