use chatpipe_core::cycle::execute_generated;
use chatpipe_core::executors::pandas::pandas_available;
use chatpipe_core::guard::GuardAction;
use chatpipe_core::history::HistoryStore;
use chatpipe_core::session::{CycleError, CycleOutcome, GenerationGate, GuardResolution, Session};
use polars::prelude::*;
use tempfile::tempdir;

fn ten_row_dataset() -> DataFrame {
    // age has 2 missing entries out of 10 rows
    df!(
        "age" => &[Some(20i64), Some(25), None, Some(30), Some(35), Some(40), None, Some(45), Some(50), Some(55)],
        "income" => &(1..=10i64).map(|n| n * 1000).collect::<Vec<_>>(),
    )
    .unwrap()
}

#[test]
fn fillna_cycle_executes_and_records_history() {
    if !pandas_available() {
        eprintln!("skipping: python3 with pandas not available");
        return;
    }
    let store_dir = tempdir().unwrap();
    let runs_dir = tempdir().unwrap();
    let history = HistoryStore::new(store_dir.path().to_path_buf());

    let mut session = Session::new();
    session.load_dataset(ten_row_dataset());
    session.submit_instruction("fill missing age with the mean").unwrap();

    let gate = session.request_generation().unwrap();
    assert_eq!(gate, GenerationGate::NeedsGuardChoice(vec!["age".to_string()]));
    let res = session.resolve_guard(GuardAction::KeepAll).unwrap();
    assert_eq!(res, GuardResolution::Proceed { rows_dropped: 0 });

    let prompt = session.prompt().unwrap();
    let code = "df['age'] = df['age'].fillna(df['age'].mean())";
    let report = execute_generated(&mut session, &history, runs_dir.path(), &prompt, code).unwrap();

    assert!(matches!(report.outcome, CycleOutcome::Executed));
    let result = session.last_result().unwrap();
    assert_eq!(result.height(), 10);
    assert_eq!(result.column("age").unwrap().null_count(), 0);

    // Exactly one record, carrying the exact prompt and code used.
    let records = history.list(10).unwrap();
    assert_eq!(records.len(), 1);
    let record = history.read_record(&records[0]).unwrap();
    assert_eq!(record.prompt, prompt);
    assert_eq!(record.code, code);
}

#[test]
fn failing_code_keeps_state_but_still_records_history() {
    if !pandas_available() {
        eprintln!("skipping: python3 with pandas not available");
        return;
    }
    let store_dir = tempdir().unwrap();
    let runs_dir = tempdir().unwrap();
    let history = HistoryStore::new(store_dir.path().to_path_buf());

    let mut session = Session::new();
    session.load_dataset(ten_row_dataset());
    let before = session.dataset().unwrap().clone();
    session.submit_instruction("normalize the income column").unwrap();
    assert_eq!(session.request_generation().unwrap(), GenerationGate::Ready);

    let prompt = session.prompt().unwrap();
    let code = "df['typo_column'] = df['typo_column'] * 2";
    let report = execute_generated(&mut session, &history, runs_dir.path(), &prompt, code).unwrap();

    match report.outcome {
        CycleOutcome::Failed(CycleError::Execution(_)) => {}
        other => panic!("expected an execution failure, got {other:?}"),
    }
    assert!(session.last_result().is_none());
    assert!(session.dataset().unwrap().equals_missing(&before));

    // The record was written before the execution attempt.
    assert_eq!(history.list(10).unwrap().len(), 1);
}

#[test]
fn cancel_leaves_the_history_store_untouched() {
    let store_dir = tempdir().unwrap();
    let history = HistoryStore::new(store_dir.path().to_path_buf());

    let mut session = Session::new();
    session.load_dataset(ten_row_dataset());
    let before = session.dataset().unwrap().clone();
    session.submit_instruction("fill missing age with the mean").unwrap();
    session.request_generation().unwrap();
    let res = session.resolve_guard(GuardAction::Cancel).unwrap();

    assert_eq!(res, GuardResolution::Cancelled);
    assert!(session.dataset().unwrap().equals_missing(&before));
    assert!(session.last_result().is_none());
    assert!(history.list(10).unwrap().is_empty());
}
