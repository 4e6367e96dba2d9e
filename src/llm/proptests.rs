//! Property-based tests for the Gemini translation layer
//!
//! - Role labels survive the trip to the wire vocabulary and back
//! - Turn order and text survive translation
//! - Adjacent wire contents never share a role

use super::gemini::GeminiService;
use super::types::{LlmMessage, LlmRequest, MessageRole};
use proptest::prelude::*;

fn arb_role() -> impl Strategy<Value = MessageRole> {
    prop_oneof![Just(MessageRole::User), Just(MessageRole::Assistant)]
}

fn arb_message() -> impl Strategy<Value = LlmMessage> {
    (arb_role(), "[a-zA-Z0-9 àèéìòù.,!?]{1,60}")
        .prop_map(|(role, text)| LlmMessage { role, text })
}

fn arb_request() -> impl Strategy<Value = LlmRequest> {
    (
        "[A-Z ]{0,30}",
        proptest::collection::vec(arb_message(), 0..12),
    )
        .prop_map(|(system, messages)| LlmRequest {
            system,
            messages,
            max_tokens: None,
        })
}

proptest! {
    #[test]
    fn role_label_round_trip(role in arb_role()) {
        let label = role.remote_name();
        prop_assert_eq!(MessageRole::from_remote_name(label), Some(role));
    }

    #[test]
    fn translation_preserves_history(request in arb_request()) {
        let wire = GeminiService::translate_request(&request);
        prop_assert_eq!(GeminiService::history_of(&wire), request.messages);
    }

    #[test]
    fn adjacent_contents_alternate(request in arb_request()) {
        let wire = GeminiService::translate_request(&request);
        for pair in wire.contents.windows(2) {
            prop_assert_ne!(&pair[0].role, &pair[1].role);
        }
        prop_assert_eq!(wire.system_instruction.is_some(), !request.system.is_empty());
    }
}
