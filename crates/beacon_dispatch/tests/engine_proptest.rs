mod fixtures;

use beacon_common::models::{DeliveryOutcome, NotificationStatus};
use beacon_db::InMemoryRequestStore;
use fixtures::*;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

const CODES: [&str; 6] = [
    "messaging/invalid-registration-token",
    "messaging/registration-token-not-registered",
    "registration-token-not-registered",
    "messaging/quota-exceeded",
    "messaging/server-unavailable",
    "messaging/internal-error",
];

fn is_invalid(code: &str) -> bool {
    code.ends_with("invalid-registration-token") || code.ends_with("registration-token-not-registered")
}

// None is a success, Some(i) a failure with CODES[i].
fn outcome_strategy() -> impl Strategy<Value = Option<usize>> {
    prop_oneof![Just(None), (0..CODES.len()).prop_map(Some)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_counts_status_and_reconciliation_follow_the_outcomes(
        script in prop::collection::vec(outcome_strategy(), 1..40),
        token_pool in 1usize..10,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            // Tokens repeat when the pool is smaller than the batch.
            let token_values: Vec<String> = (0..script.len())
                .map(|i| format!("token-{:02}-abcdefgh", i % token_pool))
                .collect();
            let outcomes: Vec<DeliveryOutcome> = script
                .iter()
                .enumerate()
                .map(|(i, entry)| match entry {
                    None => delivered(&i.to_string()),
                    Some(code) => DeliveryOutcome::rejected(CODES[*code], "rejected"),
                })
                .collect();

            let provider = ScriptedProvider::new(Script::Outcomes(outcomes));
            let token_store = ObservedTokenStore::new();
            let requests = Arc::new(InMemoryRequestStore::new());
            let refs: Vec<&str> = token_values.iter().map(String::as_str).collect();
            let request = seed_request(&requests, "req-prop", &refs).await;
            let engine = build_engine(provider.clone(), token_store.clone(), requests.clone());

            let result = engine.dispatch(&request.id, &request.tokens, &request.payload).await;

            let expected_success = script.iter().filter(|e| e.is_none()).count();
            prop_assert_eq!(provider.call_count(), 1);
            prop_assert_eq!(result.success_count, expected_success);
            prop_assert_eq!(result.success_count + result.failure_count, script.len());
            prop_assert_eq!(result.error_details.len(), result.failure_count);

            let expected_status = if expected_success > 0 {
                NotificationStatus::Delivered
            } else {
                NotificationStatus::Failed
            };
            prop_assert_eq!(result.status, expected_status);

            let expected_reconciled: BTreeSet<String> = script
                .iter()
                .zip(&token_values)
                .filter_map(|(entry, token)| match entry {
                    Some(code) if is_invalid(CODES[*code]) => Some(token.clone()),
                    _ => None,
                })
                .collect();
            let lookups = token_store.lookups();
            let looked_up: BTreeSet<String> = lookups.iter().cloned().collect();
            prop_assert_eq!(lookups.len(), looked_up.len());
            prop_assert_eq!(looked_up, expected_reconciled);
            Ok(())
        })?;
    }
}
