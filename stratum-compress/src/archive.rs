//! The archive protocol for oversized tool output.
//!
//! A tool message above the `huge` threshold is rewritten in place into an
//! archive marker: a structured notice telling the agent to move the content
//! into the virtual file system with `write_file` and reference it by path
//! afterwards. Messages above the softer `large` threshold get a "suggested"
//! marker instead.

use chrono::Utc;
use serde_json::json;
use stratum_context::ArchiveThresholds;
use stratum_types::{meta, Message, Role};

/// How urgently the content should be archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveUrgency {
    /// Above `large` but below `huge`: archiving recommended.
    Suggested,
    /// At or above `huge`: archive now.
    Immediate,
}

impl ArchiveUrgency {
    /// Label used in the marker header.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ArchiveUrgency::Suggested => "SUGGESTED",
            ArchiveUrgency::Immediate => "IMMEDIATE",
        }
    }
}

/// Analysis of a tool message that crossed an archive threshold.
#[derive(Debug, Clone)]
pub struct ArchiveAnalysis {
    /// Name of the tool that produced the content.
    pub tool_name: String,
    /// Content size in characters.
    pub content_size: usize,
    /// How urgently to archive.
    pub urgency: ArchiveUrgency,
    /// One-line summary of the content.
    pub summary: String,
    /// Filename following the archive naming convention.
    pub suggested_filename: String,
}

/// `(tool-name substring, filename kind)` pairs for the naming convention.
const CONTENT_TOOL_KINDS: &[(&str, &str)] = &[
    ("get_document_content", "doc"),
    ("rag_retrieve_specific", "rag_specific"),
    ("rag_retrieve", "rag"),
    ("find_relevant_code_snippets", "code_snippets"),
    ("get_file", "source"),
];

/// Analyse a tool message against the archive thresholds.
///
/// Returns `None` for non-tool messages and for content below the `large`
/// threshold. The comparison is inclusive: content of exactly `huge`
/// characters is `Immediate`, one character below is `Suggested`.
#[must_use]
pub fn analyze_tool_message(
    message: &Message,
    thresholds: &ArchiveThresholds,
) -> Option<ArchiveAnalysis> {
    if message.role != Role::Tool || message.is_archive_marker() {
        return None;
    }
    let content_size = message.content_len();
    if content_size < thresholds.large {
        return None;
    }
    let urgency = if content_size >= thresholds.huge {
        ArchiveUrgency::Immediate
    } else {
        ArchiveUrgency::Suggested
    };
    let tool_name = message.name.clone().unwrap_or_else(|| "unknown".to_string());
    Some(ArchiveAnalysis {
        suggested_filename: generate_filename(&tool_name),
        summary: extract_summary(&message.content),
        tool_name,
        content_size,
        urgency,
    })
}

/// Rewrite a tool message into an archive marker carrying the original
/// content between delimiters.
#[must_use]
pub fn rewrite_as_marker(message: &Message, analysis: &ArchiveAnalysis) -> Message {
    let marker_content = format!(
        "[CONTENT TO ARCHIVE] {urgency}\n\n\
         Tool: {tool}\n\
         Size: {size} characters\n\
         Suggested filename: {file}\n\
         Summary: {summary}\n\n\
         Instructions: Use write_file('{file}', content) to archive this content.\n\
         Content will remain accessible via read_file() while reducing context size.\n\n\
         Full content:\n{content}\n\n\
         [END CONTENT TO ARCHIVE]",
        urgency = analysis.urgency.label(),
        tool = analysis.tool_name,
        size = analysis.content_size,
        file = analysis.suggested_filename,
        summary = analysis.summary,
        content = message.content,
    );

    let mut marker = message.clone();
    marker.content = marker_content;
    marker.metadata.insert(meta::TYPE.into(), meta::ARCHIVE_MARKER.into());
    marker.metadata.insert("original_size".into(), json!(analysis.content_size));
    marker.metadata.insert(
        "suggested_filename".into(),
        json!(analysis.suggested_filename.clone()),
    );
    marker.metadata.insert(
        "urgency".into(),
        json!(analysis.urgency.label().to_ascii_lowercase()),
    );
    marker
        .metadata
        .insert("created_at".into(), json!(Utc::now().to_rfc3339()));
    marker
}

/// Apply the archive protocol to a message if it crosses a threshold.
#[must_use]
pub fn wrap_if_oversized(message: &Message, thresholds: &ArchiveThresholds) -> Option<Message> {
    let analysis = analyze_tool_message(message, thresholds)?;
    tracing::info!(
        tool = %analysis.tool_name,
        size = analysis.content_size,
        urgency = analysis.urgency.label(),
        filename = %analysis.suggested_filename,
        "rewriting oversized tool output to archive marker"
    );
    Some(rewrite_as_marker(message, &analysis))
}

/// Generate a filename for archived content: `mcp_<kind>_<YYYYMMDD_HHMMSS>.json`.
#[must_use]
pub fn generate_filename(tool_name: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let kind = CONTENT_TOOL_KINDS
        .iter()
        .find(|(needle, _)| tool_name.contains(needle))
        .map_or("content", |(_, kind)| *kind);
    format!("mcp_{kind}_{timestamp}.json")
}

/// Extract a one-line summary of large content.
fn extract_summary(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            match value {
                serde_json::Value::Object(map) => {
                    let keys: Vec<_> = map.keys().take(5).cloned().collect();
                    return format!("JSON data with keys: {}", keys.join(", "));
                }
                serde_json::Value::Array(items) => {
                    return format!("JSON array with {} items", items.len());
                }
                _ => {}
            }
        }
    }
    let head: String = content.lines().take(3).collect::<Vec<_>>().join(" ");
    if head.len() > 200 {
        let mut end = 200;
        while !head.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &head[..end])
    } else {
        head
    }
}
