//! Recognized-text matching.
//!
//! Matching is deliberately loose: a key matches when it equals the
//! normalized input or appears anywhere inside it. The first command in list
//! order wins, so the order produced by assembly is part of the contract.

use hark_core::Command;

/// Lowercase, treat every non-alphanumeric character as a word separator, and
/// fold whitespace runs to single spaces.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }

    out
}

/// Both arguments must already be normalized. Blank keys never match.
pub fn is_match(recognized: &str, key: &str) -> bool {
    if key.trim().is_empty() {
        return false;
    }
    recognized == key || recognized.contains(key)
}

/// Resolve `text` to the first command whose name or any keyword matches.
pub fn try_find_by_recognized_text<'a>(commands: &'a [Command], text: &str) -> Option<&'a Command> {
    let recognized = normalize(text);
    if recognized.is_empty() {
        return None;
    }

    commands.iter().find(|cmd| {
        std::iter::once(cmd.name())
            .chain(cmd.keywords().iter().map(String::as_str))
            .any(|key| is_match(&recognized, &normalize(key)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(name: &str, keywords: &[&str]) -> Command {
        Command::builder(name)
            .keywords(keywords.iter().copied())
            .action(|| Ok(()))
            .build()
            .unwrap()
    }

    #[test]
    fn normalize_folds_case_punctuation_and_spaces() {
        assert_eq!(normalize("  Mute,   ALICE!! "), "mute alice");
        assert_eq!(normalize("toggle-hat"), "toggle hat");
        assert_eq!(normalize("what's\tup"), "what s up");
        assert_eq!(normalize("?!."), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for s in ["Hey  Hark", " a.b,c ", "", "ÉCLAIR time", "x\n\ny", "--mute--bob--"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "input {s:?}");
        }
    }

    #[test]
    fn is_match_accepts_equality_and_substring() {
        assert!(is_match("mute all", "mute all"));
        assert!(is_match("please mute all now", "mute all"));
        assert!(!is_match("mute", "mute all"));
        assert!(!is_match("anything", ""));
        assert!(!is_match("anything", "  "));
    }

    #[test]
    fn keyword_substring_hit_on_earlier_command_wins() {
        let commands = vec![cmd("mute all", &["mute everyone"]), cmd("mute alice", &[])];
        let found = try_find_by_recognized_text(&commands, "please mute everyone now").unwrap();
        assert_eq!(found.name(), "mute all");
    }

    #[test]
    fn list_order_breaks_ties() {
        let commands = vec![cmd("hat", &[]), cmd("toggle hat", &[])];
        let found = try_find_by_recognized_text(&commands, "toggle hat").unwrap();
        assert_eq!(found.name(), "hat");
    }

    #[test]
    fn name_is_tested_before_keywords() {
        let commands = vec![cmd("Sleep", &["go to bed"])];
        let found = try_find_by_recognized_text(&commands, "SLEEP!").unwrap();
        assert_eq!(found.name(), "Sleep");
    }

    #[test]
    fn punctuation_in_keys_still_matches() {
        let commands = vec![cmd("what's the time", &[])];
        assert!(try_find_by_recognized_text(&commands, "whats the time").is_none());
        assert!(try_find_by_recognized_text(&commands, "what s the time").is_some());
    }

    #[test]
    fn blank_input_finds_nothing() {
        let commands = vec![cmd("mute", &[])];
        assert!(try_find_by_recognized_text(&commands, "   ").is_none());
        assert!(try_find_by_recognized_text(&commands, "unmute").is_some());
        assert!(try_find_by_recognized_text(&commands, "hello").is_none());
    }
}
