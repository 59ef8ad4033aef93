//! Content rules for merge notes.

use crate::types::{Role, Turn};
use crate::NOTE_PREVIEW_CHARS;

/// Body used when the summary stream produced no text.
pub const EMPTY_SUMMARY_BODY: &str = "(No summary returned)";

const EMPTY_TRANSCRIPT_BODY: &str = "(Empty)";

/// Summary note content: the streamed text verbatim, or a placeholder when
/// nothing came back.
pub fn summary_body(summary: &str) -> String {
    if summary.trim().is_empty() {
        EMPTY_SUMMARY_BODY.to_string()
    } else {
        summary.to_string()
    }
}

/// Verbatim transcript of a branch's own exchange.
///
/// Note turns (merged grandchildren) are skipped so nested merges are not
/// embedded twice.
pub fn transcript_note(depth: u32, turns: &[Turn]) -> String {
    let blocks: Vec<String> = turns
        .iter()
        .filter(|turn| !turn.is_note && !turn.content.trim().is_empty())
        .map(|turn| {
            let label = match turn.role {
                Role::User => "USER",
                Role::Assistant => "ASSISTANT",
                Role::System => "SYSTEM",
            };
            format!("{label}:\n{}", turn.content)
        })
        .collect();

    let noun = if blocks.len() == 1 { "entry" } else { "entries" };
    let header = format!("Transcript (Branch L{depth}) — {} {noun}", blocks.len());
    let body = if blocks.is_empty() {
        EMPTY_TRANSCRIPT_BODY.to_string()
    } else {
        blocks.join("\n\n")
    };

    format!("{header}\n\n{body}")
}

/// First non-blank line, cut to [`NOTE_PREVIEW_CHARS`] with an ellipsis.
pub fn note_preview(content: &str) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();

    match line.char_indices().nth(NOTE_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}…", &line[..cut]),
        None => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_lists_user_and_assistant_blocks() {
        let turns = vec![Turn::user("hi"), Turn::assistant("hello")];
        let note = transcript_note(2, &turns);
        assert_eq!(
            note,
            "Transcript (Branch L2) — 2 entries\n\nUSER:\nhi\n\nASSISTANT:\nhello"
        );
    }

    #[test]
    fn transcript_skips_note_turns() {
        let turns = vec![
            Turn::user("what is a ribosome?"),
            Turn::note("child summary"),
            Turn::note("Transcript (Branch L3) — 2 entries"),
            Turn::assistant("a molecular machine"),
        ];
        let note = transcript_note(2, &turns);
        assert!(!note.contains("child summary"));
        assert!(note.starts_with("Transcript (Branch L2) — 2 entries"));
    }

    #[test]
    fn transcript_without_entries_is_marked_empty() {
        let turns = vec![Turn::note("only a note")];
        assert_eq!(
            transcript_note(3, &turns),
            "Transcript (Branch L3) — 0 entries\n\n(Empty)"
        );
    }

    #[test]
    fn transcript_uses_singular_for_one_entry() {
        let note = transcript_note(2, &[Turn::user("alone")]);
        assert!(note.starts_with("Transcript (Branch L2) — 1 entry\n"));
    }

    #[test]
    fn empty_summary_gets_placeholder() {
        assert_eq!(summary_body("  \n"), EMPTY_SUMMARY_BODY);
        assert_eq!(summary_body("Greeting exchanged."), "Greeting exchanged.");
    }

    #[test]
    fn preview_uses_first_non_blank_line() {
        assert_eq!(note_preview("\n\n  - point one\n- point two"), "- point one");
    }

    #[test]
    fn preview_truncates_long_lines() {
        let long = "x".repeat(200);
        let preview = note_preview(&long);
        assert_eq!(preview.chars().count(), NOTE_PREVIEW_CHARS + 1);
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn preview_of_exact_budget_is_untouched() {
        let exact = "y".repeat(NOTE_PREVIEW_CHARS);
        assert_eq!(note_preview(&exact), exact);
    }
}
