//! Fuzzy match-and-replace for `edit_code`.
//!
//! Model-produced `old_text` rarely matches the file byte-for-byte: tabs
//! become spaces, trailing whitespace drifts, interior runs collapse. The
//! ladder below tries progressively more permissive strategies and stops at
//! the first match. Each strategy is a pure function over the inputs so it
//! can be tested in isolation.
//!
//! Only the **first** occurrence is ever replaced.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MatchStrategy
// ---------------------------------------------------------------------------

/// Which rung of the ladder produced a match. Reported in result metadata so
/// the orchestrator can see how far from exact the model's quote was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStrategy {
    Exact,
    LineTrimmed,
    WhitespaceNormalized,
    IndentFlexible,
    BlockAnchor,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::LineTrimmed => "line-trimmed",
            MatchStrategy::WhitespaceNormalized => "whitespace-normalized",
            MatchStrategy::IndentFlexible => "indent-flexible",
            MatchStrategy::BlockAnchor => "block-anchor",
        }
    }
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Ladder entry point
// ---------------------------------------------------------------------------

/// Replace the first occurrence of `old` in `content` with `new`, trying each
/// strategy in order. Returns the rewritten content and the strategy that
/// matched, or `None` when no rung matches.
pub fn apply_replacement(content: &str, old: &str, new: &str) -> Option<(String, MatchStrategy)> {
    if old.is_empty() {
        return None;
    }

    if let Some(out) = exact(content, old, new) {
        return Some((out, MatchStrategy::Exact));
    }
    if let Some(out) = line_trimmed(content, old, new) {
        return Some((out, MatchStrategy::LineTrimmed));
    }
    if let Some(out) = whitespace_normalized(content, old, new) {
        return Some((out, MatchStrategy::WhitespaceNormalized));
    }
    if let Some(out) = indent_flexible(content, old, new) {
        return Some((out, MatchStrategy::IndentFlexible));
    }
    if let Some(out) = block_anchor(content, old, new) {
        return Some((out, MatchStrategy::BlockAnchor));
    }
    None
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Byte-exact substring replacement.
fn exact(content: &str, old: &str, new: &str) -> Option<String> {
    let pos = content.find(old)?;
    let mut out = String::with_capacity(content.len() - old.len() + new.len());
    out.push_str(&content[..pos]);
    out.push_str(new);
    out.push_str(&content[pos + old.len()..]);
    Some(out)
}

/// Per-line match ignoring trailing whitespace. Leading indentation must
/// still agree, which keeps this rung from swallowing indentation drift that
/// `indent-flexible` is meant to catch (and report).
fn line_trimmed(content: &str, old: &str, new: &str) -> Option<String> {
    match_lines(content, old, new, |line| line.trim_end().to_string())
}

/// Per-line match with interior whitespace runs collapsed to a single space.
/// Leading indentation is preserved in the comparison key.
fn whitespace_normalized(content: &str, old: &str, new: &str) -> Option<String> {
    match_lines(content, old, new, |line| {
        let rest = line.trim_start();
        let indent = &line[..line.len() - rest.len()];
        let mut key = String::with_capacity(line.len());
        key.push_str(indent);
        let mut last_was_ws = false;
        for ch in rest.trim_end().chars() {
            if ch.is_whitespace() {
                if !last_was_ws {
                    key.push(' ');
                }
                last_was_ws = true;
            } else {
                key.push(ch);
                last_was_ws = false;
            }
        }
        key
    })
}

/// Per-line match ignoring leading and trailing whitespace entirely. The
/// replacement re-applies the indentation observed on the first matched line
/// so the edit lands at the file's real indentation level.
fn indent_flexible(content: &str, old: &str, new: &str) -> Option<String> {
    let content_lines: Vec<&str> = content.split('\n').collect();
    let old_lines = pattern_lines(old);
    let start = find_window(&content_lines, &old_lines, |line| line.trim().to_string())?;

    let actual_indent = leading_ws(content_lines[start]);
    let pattern_indent = leading_ws(old_lines[0]);

    let replacement: Vec<String> = new
        .split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                return line.to_string();
            }
            let stripped = line.strip_prefix(pattern_indent).unwrap_or(line);
            format!("{actual_indent}{stripped}")
        })
        .collect();

    Some(splice(&content_lines, start, old_lines.len(), &replacement))
}

/// Anchor on the first and last non-empty lines of the pattern (trimmed
/// equality) over a window of the pattern's own size. The interior may have
/// drifted, but at least half of the interior lines must still match —
/// anchors alone (`fn … {` + `}`) would otherwise claim any same-shaped
/// block. Requires a pattern of at least two non-empty lines so a lone `}`
/// can never anchor.
fn block_anchor(content: &str, old: &str, new: &str) -> Option<String> {
    let mut old_lines = pattern_lines(old);
    // Anchors are the first and last non-empty lines; fully-empty edge lines
    // do not participate in the window.
    while old_lines.first().is_some_and(|l| l.trim().is_empty()) {
        old_lines.remove(0);
    }
    while old_lines.last().is_some_and(|l| l.trim().is_empty()) {
        old_lines.pop();
    }
    let non_empty_count = old_lines.iter().filter(|l| !l.trim().is_empty()).count();
    if non_empty_count < 2 {
        return None;
    }
    let first_anchor = old_lines.first()?.trim();
    let last_anchor = old_lines.last()?.trim();
    let window = old_lines.len();

    let content_lines: Vec<&str> = content.split('\n').collect();
    if content_lines.len() < window {
        return None;
    }

    for start in 0..=content_lines.len() - window {
        if content_lines[start].trim() != first_anchor
            || content_lines[start + window - 1].trim() != last_anchor
        {
            continue;
        }
        let interior = &old_lines[1..window - 1];
        let matching = interior
            .iter()
            .enumerate()
            .filter(|(j, ol)| content_lines[start + 1 + j].trim() == ol.trim())
            .count();
        if matching * 2 < interior.len() {
            continue;
        }
        let replacement: Vec<String> = new.split('\n').map(str::to_string).collect();
        return Some(splice(&content_lines, start, window, &replacement));
    }
    None
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Pattern lines, with a trailing empty line (from a final `\n`) dropped so
/// `"a\nb\n"` and `"a\nb"` describe the same two-line pattern.
fn pattern_lines(pattern: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = pattern.split('\n').collect();
    if lines.len() > 1 && lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

fn leading_ws(line: &str) -> &str {
    let rest = line.trim_start();
    &line[..line.len() - rest.len()]
}

/// First window of `content_lines` whose keyed form equals the keyed pattern.
fn find_window(
    content_lines: &[&str],
    old_lines: &[&str],
    key: impl Fn(&str) -> String,
) -> Option<usize> {
    if old_lines.is_empty() || content_lines.len() < old_lines.len() {
        return None;
    }
    let old_keys: Vec<String> = old_lines.iter().map(|l| key(l)).collect();
    (0..=content_lines.len() - old_lines.len()).find(|&start| {
        old_keys
            .iter()
            .enumerate()
            .all(|(j, ok)| key(content_lines[start + j]) == *ok)
    })
}

/// Line-window replace shared by the keyed strategies.
fn match_lines(
    content: &str,
    old: &str,
    new: &str,
    key: impl Fn(&str) -> String,
) -> Option<String> {
    let content_lines: Vec<&str> = content.split('\n').collect();
    let old_lines = pattern_lines(old);
    let start = find_window(&content_lines, &old_lines, key)?;
    let replacement: Vec<String> = new.split('\n').map(str::to_string).collect();
    Some(splice(&content_lines, start, old_lines.len(), &replacement))
}

fn splice(content_lines: &[&str], start: usize, len: usize, replacement: &[String]) -> String {
    let mut out: Vec<&str> = Vec::with_capacity(content_lines.len());
    out.extend_from_slice(&content_lines[..start]);
    out.extend(replacement.iter().map(String::as_str));
    out.extend_from_slice(&content_lines[start + len..]);
    out.join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
