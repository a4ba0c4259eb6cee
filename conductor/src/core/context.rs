//! Predecessor context assembly from actor memory files.
//!
//! Actor outputs are markdown files with numbered `## Section N:` headings.
//! Downstream actors receive Section 3 of each predecessor; a predecessor
//! that produced no file yields an explicit "not available" entry instead of
//! failing the directive.

use std::sync::LazyLock;

use regex::Regex;

use super::actor::Actor;

/// Section consumed by downstream actors.
pub const DOWNSTREAM_SECTION: u8 = 3;

/// Shown when a step has no predecessors.
pub const NO_PREDECESSORS: &str = "No predecessor context available.";

static SECTION_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^##\s*Section\s+(\d+):[^\n]*$").expect("section header regex")
});

static RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^---\s*$").expect("horizontal rule regex"));

/// Body of `## Section {number}:` up to the next section heading, a `---`
/// rule, or end of file. Trimmed; `None` when the heading is absent.
pub fn read_section(content: &str, number: u8) -> Option<String> {
    let headers: Vec<_> = SECTION_HEADER_RE.captures_iter(content).collect();
    let index = headers
        .iter()
        .position(|caps| caps[1].parse::<u8>().ok() == Some(number))?;
    let start = headers[index].get(0)?.end();
    let mut end = headers
        .get(index + 1)
        .and_then(|caps| caps.get(0))
        .map_or(content.len(), |m| m.start());
    if let Some(rule) = RULE_RE.find_at(content, start) {
        end = end.min(rule.start());
    }
    Some(content[start..end].trim().to_string())
}

/// What the orchestrator found on disk for one predecessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredecessorOutput {
    pub actor: Actor,
    /// Expected location of the memory file, shown when it is missing.
    pub location: String,
    /// File contents, `None` when the file does not exist.
    pub content: Option<String>,
}

/// Concatenate predecessor context for a directive.
///
/// Empty downstream sections fall back to the whole file, truncated to
/// `truncate_chars` characters.
pub fn compose_context(outputs: &[PredecessorOutput], truncate_chars: usize) -> String {
    if outputs.is_empty() {
        return NO_PREDECESSORS.to_string();
    }
    outputs
        .iter()
        .map(|output| match &output.content {
            None => format!(
                "### {} (not available)\nMemory file not found: {}",
                output.actor, output.location
            ),
            Some(content) => {
                let body = read_section(content, DOWNSTREAM_SECTION)
                    .filter(|section| !section.is_empty())
                    .unwrap_or_else(|| truncate(content, truncate_chars));
                format!("### {}\n{}", output.actor, body)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncate(content: &str, limit: usize) -> String {
    if content.chars().count() <= limit {
        return content.to_string();
    }
    let mut out: String = content.chars().take(limit).collect();
    out.push_str("\n... (truncated)");
    out
}
