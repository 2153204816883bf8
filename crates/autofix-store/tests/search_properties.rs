//! Search filters only ever narrow the unfiltered result

use autofix_artifact::{ExecutionAttempt, Filename, ProjectName};
use autofix_store::{HistoryLedger, HistorySearch, MemoryRecordStore};
use proptest::prelude::*;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn keyword_search_is_a_filtered_subset(
        instructions in prop::collection::vec("[a-zA-Z ]{0,12}", 0..12),
        keyword in "[a-zA-Z]{1,3}",
    ) {
        let (all, found) = runtime().block_on(async {
            let ledger = HistoryLedger::new(Arc::new(MemoryRecordStore::new()));
            let project = ProjectName::new("prop").unwrap();
            let filename = Filename::new("main.py").unwrap();

            for instruction in &instructions {
                ledger
                    .append(ExecutionAttempt::new(
                        project.clone(),
                        filename.clone(),
                        instruction.clone(),
                        "pass",
                    ))
                    .await
                    .unwrap();
            }

            let all = ledger.search(&project, &HistorySearch::new()).await.unwrap();
            let found = ledger
                .search(&project, &HistorySearch::new().with_keyword(keyword.clone()))
                .await
                .unwrap();
            (all, found)
        });

        prop_assert_eq!(all.len(), instructions.len());
        let needle = keyword.to_lowercase();
        for record in &found {
            prop_assert!(all.contains(record));
            prop_assert!(record.instruction.to_lowercase().contains(&needle));
        }
        let expected = instructions
            .iter()
            .filter(|i| i.to_lowercase().contains(&needle))
            .count();
        prop_assert_eq!(found.len(), expected);
    }
}
