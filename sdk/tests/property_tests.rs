use proptest::prelude::*;
use sdk::errors::{EngineError, ErrorExt};

// User hints are static strings: whatever detail an error carries never
// leaks into the hint shown on the console.
proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "\\PC*") {
        let errs = vec![
            EngineError::MalformedResponse(error_str.clone()),
            EngineError::UnknownActionType(error_str.clone()),
            EngineError::UnknownTool(error_str.clone()),
            EngineError::Validation(error_str.clone()),
            EngineError::StoreUnavailable(error_str.clone()),
            EngineError::LLMProvider(error_str.clone()),
            EngineError::Config(error_str.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains('{'), "hint must not contain a brace");
        }
    }
}

proptest! {
    #[test]
    fn test_retry_budget_message_names_attempts(attempts in 1usize..1000) {
        let err = EngineError::RetryBudgetExhausted { attempts };
        prop_assert!(err.to_string().contains(&attempts.to_string()));
        prop_assert!(!err.is_retryable());
    }
}
