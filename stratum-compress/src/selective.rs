//! Selective compression: preserve critical elements, summarise the rest.

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use serde_json::json;
use stratum_context::ArchiveThresholds;
use stratum_types::{meta, Message, Role};

use crate::archive;

/// Minimum length of a compressible run before it is replaced by a summary.
const MIN_RUN: usize = 10;

/// Content markers indicating a message carries todo state.
const TODO_INDICATORS: &[&str] = &[
    "write_todos",
    "todo list",
    "task tracking",
    "pending",
    "in_progress",
    "completed",
];

/// Content markers indicating a message references the virtual file system.
const FS_INDICATORS: &[&str] = &[
    "write_file",
    "read_file",
    "edit_file",
    "ls()",
    "virtual filesystem",
];

/// Decides which messages must never be summarised away.
#[derive(Debug, Clone)]
pub struct PreservationRules {
    /// Number of trailing messages preserved verbatim.
    pub recent_window: usize,
}

impl PreservationRules {
    /// Rules preserving the last `recent_window` messages.
    #[must_use]
    pub fn new(recent_window: usize) -> Self {
        Self { recent_window }
    }

    /// Whether the message at `index` of `total` must be preserved.
    #[must_use]
    pub fn should_preserve(&self, message: &Message, index: usize, total: usize) -> bool {
        if message.role == Role::System {
            return true;
        }
        if index + self.recent_window >= total {
            return true;
        }
        // Tool results get a more generous window.
        if message.role == Role::Tool && index + self.recent_window * 2 >= total {
            return true;
        }
        let content = message.content.to_lowercase();
        if TODO_INDICATORS.iter().any(|m| content.contains(m)) {
            return true;
        }
        if FS_INDICATORS.iter().any(|m| content.contains(m)) {
            return true;
        }
        false
    }
}

fn topic_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\b(?:function|class|method|variable)\s+(\w+)",
            r"(?i)\b(?:import|from)\s+(\w+)",
            r"(?i)\b(API|endpoint|service|database|query)\b",
            r"(?i)\b(error|exception|bug|issue)\b",
            r"(?i)\b(test|testing)\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static pattern"))
        .collect()
    })
}

/// Extract up to ten key topics from a run of messages.
#[must_use]
pub fn extract_topics(messages: &[Message]) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();
    for message in messages {
        for pattern in topic_patterns() {
            for caps in pattern.captures_iter(&message.content) {
                if let Some(m) = caps.get(1) {
                    let topic = m.as_str().to_string();
                    if !topics.contains(&topic) {
                        topics.push(topic);
                    }
                }
            }
        }
    }
    topics.truncate(10);
    topics
}

/// Classify a run's length into a coarse timeframe description.
#[must_use]
pub fn timeframe(count: usize) -> &'static str {
    match count {
        0..=5 => "Brief conversation",
        6..=15 => "Medium conversation",
        _ => "Extended conversation",
    }
}

/// Per-call statistics from a selective compression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectiveStats {
    /// Messages examined.
    pub processed: usize,
    /// Messages kept verbatim.
    pub preserved: usize,
    /// Messages folded into summaries.
    pub compressed: usize,
    /// Archive markers created.
    pub archive_markers: usize,
}

/// Rule-based compressor: partitions messages into preserved and
/// compressible, rewrites oversized tool output into archive markers, and
/// replaces compressible runs of at least [`MIN_RUN`] messages with one
/// synthetic summary each.
#[derive(Debug, Clone)]
pub struct SelectiveCompressor {
    rules: PreservationRules,
    archive_thresholds: ArchiveThresholds,
}

impl SelectiveCompressor {
    /// Create a compressor preserving the last `recent_window` messages.
    #[must_use]
    pub fn new(recent_window: usize, archive_thresholds: ArchiveThresholds) -> Self {
        Self {
            rules: PreservationRules::new(recent_window),
            archive_thresholds,
        }
    }

    /// The preservation rules in use.
    #[must_use]
    pub fn rules(&self) -> &PreservationRules {
        &self.rules
    }

    /// Compress a message list, returning the replacement and statistics.
    ///
    /// Preserved messages pass through byte-identical. Compressible runs of
    /// fewer than [`MIN_RUN`] messages also pass through; longer runs become
    /// one summary message each.
    #[must_use]
    pub fn compress(&self, messages: &[Message]) -> (Vec<Message>, SelectiveStats) {
        let total = messages.len();
        let mut stats = SelectiveStats {
            processed: total,
            ..Default::default()
        };
        if total == 0 {
            return (Vec::new(), stats);
        }

        let mut output: Vec<Message> = Vec::with_capacity(total);
        let mut run: Vec<Message> = Vec::new();

        for (index, message) in messages.iter().enumerate() {
            // Oversized tool output becomes an archive marker and passes
            // through so the agent can act on it.
            if let Some(marker) = archive::wrap_if_oversized(message, &self.archive_thresholds) {
                self.flush_run(&mut run, &mut output, &mut stats);
                stats.archive_markers += 1;
                stats.preserved += 1;
                output.push(marker);
                continue;
            }

            if self.rules.should_preserve(message, index, total) {
                self.flush_run(&mut run, &mut output, &mut stats);
                stats.preserved += 1;
                output.push(message.clone());
            } else {
                run.push(message.clone());
            }
        }
        self.flush_run(&mut run, &mut output, &mut stats);

        tracing::info!(
            input = total,
            output = output.len(),
            preserved = stats.preserved,
            compressed = stats.compressed,
            archive_markers = stats.archive_markers,
            "selective compression complete"
        );
        (output, stats)
    }

    fn flush_run(
        &self,
        run: &mut Vec<Message>,
        output: &mut Vec<Message>,
        stats: &mut SelectiveStats,
    ) {
        if run.is_empty() {
            return;
        }
        if run.len() < MIN_RUN {
            stats.preserved += run.len();
            output.append(run);
            return;
        }
        stats.compressed += run.len();
        output.push(summarize_run(run));
        run.clear();
    }
}

/// Build the synthetic summary message replacing a compressible run.
#[must_use]
pub fn summarize_run(run: &[Message]) -> Message {
    let users = run.iter().filter(|m| m.role == Role::User).count();
    let assistants = run.iter().filter(|m| m.role == Role::Assistant).count();
    let tools = run.iter().filter(|m| m.role == Role::Tool).count();
    let topics = extract_topics(run);
    let topics_line = if topics.is_empty() {
        "General conversation".to_string()
    } else {
        topics.join(", ")
    };

    let content = format!(
        "[Conversation Summary - {count} messages compressed]\n\n\
         User Requests: {users} requests\n\
         Assistant Actions: {assistants} responses\n\
         Tool Calls: {tools} tool invocations\n\
         Key Topics: {topics_line}\n\
         Timeframe: {timeframe}\n\n\
         Note: This summary replaces {count} historical messages to manage context size.",
        count = run.len(),
        timeframe = timeframe(run.len()),
    );

    Message::system(content)
        .with_metadata(meta::TYPE, meta::COMPRESSION_SUMMARY.into())
        .with_metadata(meta::ORIGINAL_COUNT, json!(run.len()))
        .with_metadata(meta::COMPRESSED_AT, json!(Utc::now().to_rfc3339()))
}
