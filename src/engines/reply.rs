//! Deterministic cleanup of LLM replies.
//!
//! Even well-prompted models wrap answers in code fences, answer with CRLF
//! line endings, or sprinkle zero-width characters into transcriptions. The
//! rules below fix those quirks without touching content, so the prompts in
//! [`crate::prompts`] can stay focused on *what* to extract.

use crate::prompts::NO_TEXT_SENTINEL;
use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a vision-model transcription of one region.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 1
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Map the "no text" sentinel to an empty string
pub fn clean_transcription(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    if s.trim() == NO_TEXT_SENTINEL {
        String::new()
    } else {
        s
    }
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n(.*)\n```\s*$").unwrap());

pub fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 5: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── JSON extraction ─────────────────────────────────────────────────────────

static RE_JSON_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

/// Locate the outermost JSON array in a chat reply.
///
/// Models asked for "only JSON" still prepend prose or fences now and then.
pub fn extract_json_array(input: &str) -> Option<String> {
    let unfenced = strip_code_fences(input);
    RE_JSON_ARRAY
        .find(&unfenced)
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_code_fences("```text\nPatient stable\n```"), "Patient stable");
        assert_eq!(strip_code_fences("```\nline\n```"), "line");
        assert_eq!(strip_code_fences("no fences"), "no fences");
    }

    #[test]
    fn test_clean_transcription() {
        let raw = "```\nBP 120/80  \r\n\r\n\r\n\r\nHR\u{200B} 72\n```";
        assert_eq!(clean_transcription(raw), "BP 120/80\n\nHR 72");
    }

    #[test]
    fn test_sentinel_becomes_empty() {
        assert_eq!(clean_transcription(NO_TEXT_SENTINEL), "");
        assert_eq!(clean_transcription(&format!("  {NO_TEXT_SENTINEL}\n")), "");
    }

    #[test]
    fn test_extract_json_array() {
        let reply = "Here you go:\n```json\n[{\"label\":\"Drug\"}]\n```";
        assert_eq!(
            extract_json_array(reply).as_deref(),
            Some("[{\"label\":\"Drug\"}]")
        );
        assert_eq!(extract_json_array("[]").as_deref(), Some("[]"));
        assert_eq!(extract_json_array("nothing here"), None);
    }
}
