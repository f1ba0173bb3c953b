mod common;

use std::sync::Arc;

use common::strategies::*;
use common::{block_on, common, critical, DispatcherBuilder};
use dispatch_core::dispatcher::InstantExecutor;
use proptest::prelude::*;
use std::collections::HashMap;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: per-author counts equal submit calls, whatever the outcome
    #[test]
    fn author_counts_match_submissions(submissions in submissions_strategy(), capacity in 1usize..5) {
        let (stats, accepted, rejected) = block_on(async {
            let harness = DispatcherBuilder::new(Arc::new(InstantExecutor))
                .queue_capacity(capacity)
                .build();
            let dispatcher = &harness.dispatcher;

            // Pool stays unstarted so common submissions overflow past capacity
            let mut accepted = 0u64;
            let mut rejected = 0u64;
            for (i, (author, is_critical)) in submissions.iter().enumerate() {
                let description = format!("command {i}");
                let command = if *is_critical {
                    critical(&description, author)
                } else {
                    common(&description, author)
                };
                match dispatcher.submit(command).await {
                    Ok(_) => accepted += 1,
                    Err(e) if e.is_rejection() => rejected += 1,
                    Err(e) => panic!("unexpected failure: {e}"),
                }
            }
            dispatcher.shutdown().await;
            (dispatcher.command_stats_by_author(), accepted, rejected)
        });

        let mut expected: HashMap<String, u64> = HashMap::new();
        for (author, _) in &submissions {
            *expected.entry(author.clone()).or_insert(0) += 1;
        }

        prop_assert_eq!(stats, expected);
        prop_assert_eq!(accepted + rejected, submissions.len() as u64);

        let common_count = submissions.iter().filter(|(_, c)| !*c).count() as u64;
        prop_assert_eq!(rejected, common_count.saturating_sub(capacity as u64));
    }
}
