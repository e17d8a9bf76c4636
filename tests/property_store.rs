use proptest::prelude::*;

use testdrive::store::{ExperimentResult, RunStore};
use testdrive::types::RunStatus;

#[derive(Debug, Clone)]
enum Op {
    Update(RunStatus, f64),
    SaveResult,
}

fn status_strategy() -> impl Strategy<Value = RunStatus> {
    prop_oneof![
        Just(RunStatus::Pending),
        Just(RunStatus::Initializing),
        Just(RunStatus::Running),
        Just(RunStatus::Analyzing),
        Just(RunStatus::Completed),
        Just(RunStatus::Failed),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (status_strategy(), 0.0..=100.0f64).prop_map(|(s, p)| Op::Update(s, p)),
        1 => Just(Op::SaveResult),
    ]
}

proptest! {
    #[test]
    fn terminal_runs_never_change(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let store = RunStore::new();
        let run = store.create("bank-portal-migration").unwrap();
        let mut frozen = None;

        for (i, op) in ops.into_iter().enumerate() {
            let is_update = matches!(op, Op::Update(..));
            let outcome = match op {
                Op::Update(status, progress) => store
                    .update_status(&run.run_id, status, progress, format!("step {i}"))
                    .map(|_| ()),
                Op::SaveResult => store
                    .save_result(ExperimentResult::empty(run.run_id, "bank-portal-migration"))
                    .map(|_| ()),
            };

            let current = store.get(&run.run_id).unwrap();

            // completed_at is present exactly when the status is terminal.
            prop_assert_eq!(current.completed_at.is_some(), current.is_terminal());

            let fixed = (
                current.status,
                current.current_step.clone(),
                current.completed_at,
                current.error_message.clone(),
            );
            if let Some(ref before) = frozen {
                if is_update {
                    prop_assert!(outcome.is_err());
                }
                prop_assert_eq!(&fixed, before);
            } else if current.is_terminal() {
                frozen = Some(fixed);
            }
        }
    }

    #[test]
    fn results_only_exist_for_completed_runs(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let store = RunStore::new();
        let run = store.create("loan-approval-optimization").unwrap();

        for op in ops {
            let _ = match op {
                Op::Update(status, progress) => store
                    .update_status(&run.run_id, status, progress, "step")
                    .map(|_| ()),
                Op::SaveResult => store
                    .save_result(ExperimentResult::empty(run.run_id, "loan-approval-optimization"))
                    .map(|_| ()),
            };

            let current = store.get(&run.run_id).unwrap();
            if store.get_result(&run.run_id).is_ok() {
                prop_assert_eq!(current.status, RunStatus::Completed);
                prop_assert_eq!(current.progress, 100.0);
            }
            if current.status == RunStatus::Failed {
                prop_assert!(current.error_message.is_some());
            }
        }
    }
}
