//! Integration tests for the compressor against literal scenarios.

use stratum_compress::Compressor;
use stratum_context::{ContextConfig, ContextMetrics, TokenCounter};
use stratum_types::Message;

fn metrics_for(messages: &[Message], config: &ContextConfig) -> ContextMetrics {
    let tokens = TokenCounter::new().estimate_messages(messages, "test-model");
    ContextMetrics::from_tokens(
        tokens,
        config.max_context_window,
        config.trigger_threshold,
        config.post_tool_threshold,
    )
}

#[tokio::test]
async fn two_hundred_messages_compress_to_a_handful() {
    let config = ContextConfig {
        max_context_window: 50_000,
        trigger_threshold: 0.80,
        preserve_last_n_messages: 3,
        ..Default::default()
    };
    let messages: Vec<Message> = (0..200)
        .map(|i| {
            let filler = "analysis of the module structure and its call graph. ".repeat(15);
            if i % 2 == 0 {
                Message::user(format!("turn {i}: {filler}"))
            } else {
                Message::assistant(format!("turn {i}: {filler}"))
            }
        })
        .collect();
    // ~800 chars per message: confirm the scenario premise.
    assert!(messages[0].content.len() > 700 && messages[0].content.len() < 900);

    let metrics = metrics_for(&messages, &config);
    assert!(metrics.should_compact());

    let compressor = Compressor::selective_only(config.clone());
    let outcome = compressor.compress(&messages, &metrics, "test-model").await;

    assert!(outcome.changed);
    assert!(outcome.messages.len() <= 10);
    assert!(outcome.messages[0].is_compression_summary());
    assert_eq!(&outcome.messages[outcome.messages.len() - 3..], &messages[197..]);
}

#[tokio::test]
async fn empty_conversation_never_triggers() {
    let config = ContextConfig::default();
    let metrics = metrics_for(&[], &config);
    assert_eq!(metrics.tokens_used, 0);
    assert!(!metrics.should_compact());

    let compressor = Compressor::selective_only(config);
    let outcome = compressor.compress(&[], &metrics, "test-model").await;
    assert!(!outcome.changed);
}

#[tokio::test]
async fn utilization_exactly_at_threshold_triggers() {
    let config = ContextConfig {
        max_context_window: 1_000,
        trigger_threshold: 0.85,
        ..Default::default()
    };
    // One message of exactly 850 tokens: (850 - 4) * 4 chars.
    let messages = vec![Message::user("a".repeat((850 - 4) * 4))];
    let metrics = metrics_for(&messages, &config);
    assert_eq!(metrics.tokens_used, 850);
    assert!(metrics.should_compact());
}
