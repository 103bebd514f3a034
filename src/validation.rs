//! Command table lint and outbound payload sizing

use crate::beacon::table::CommandTable;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Suffix appended to truncated replies
const TRUNCATION_MARKER: &str = "...";

/// A problem found in the command table. None of these stop the beacon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLint {
    /// Entry at `index` has an empty trigger and can never match
    EmptyTrigger { index: usize },
    /// Trigger contains whitespace; messages are split on whitespace so it can never match
    WhitespaceInTrigger { index: usize, trigger: String },
    /// Entry is shadowed by an earlier entry with the same trigger
    DuplicateTrigger {
        index: usize,
        first_index: usize,
        trigger: String,
    },
    /// Entry would reply with nothing
    EmptyResponse { index: usize, trigger: String },
}

impl fmt::Display for CommandLint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLint::EmptyTrigger { index } => {
                write!(f, "command #{} has an empty trigger", index + 1)
            }
            CommandLint::WhitespaceInTrigger { index, trigger } => write!(
                f,
                "command #{} trigger '{}' contains whitespace and can never match",
                index + 1,
                trigger
            ),
            CommandLint::DuplicateTrigger {
                index,
                first_index,
                trigger,
            } => write!(
                f,
                "command #{} trigger '{}' is shadowed by command #{}",
                index + 1,
                trigger,
                first_index + 1
            ),
            CommandLint::EmptyResponse { index, trigger } => write!(
                f,
                "command #{} '{}' has an empty response",
                index + 1,
                trigger
            ),
        }
    }
}

pub fn lint_commands(table: &CommandTable) -> Vec<CommandLint> {
    let mut lints = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (index, entry) in table.iter().enumerate() {
        let trigger = entry.trigger.as_str();
        if trigger.is_empty() {
            lints.push(CommandLint::EmptyTrigger { index });
        } else if trigger.chars().any(char::is_whitespace) {
            lints.push(CommandLint::WhitespaceInTrigger {
                index,
                trigger: trigger.to_string(),
            });
        } else if let Some(&first_index) = seen.get(trigger) {
            lints.push(CommandLint::DuplicateTrigger {
                index,
                first_index,
                trigger: trigger.to_string(),
            });
        } else {
            seen.insert(trigger, index);
        }

        if entry.response.is_empty() {
            lints.push(CommandLint::EmptyResponse {
                index,
                trigger: trigger.to_string(),
            });
        }
    }
    lints
}

/// Fit `text` into `max_bytes`, cutting at a char boundary and appending `...` when
/// it does not fit.
pub fn fit_payload(text: &str, max_bytes: usize) -> Cow<'_, str> {
    if text.len() <= max_bytes {
        return Cow::Borrowed(text);
    }
    if max_bytes < TRUNCATION_MARKER.len() {
        let mut cut = max_bytes;
        while cut > 0 && !text.is_char_boundary(cut) {
            cut -= 1;
        }
        return Cow::Owned(text[..cut].to_string());
    }
    let mut cut = max_bytes - TRUNCATION_MARKER.len();
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
    out.push_str(&text[..cut]);
    out.push_str(TRUNCATION_MARKER);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::table::CommandEntry;

    #[test]
    fn clean_table_has_no_lints() {
        assert!(lint_commands(&CommandTable::starter()).is_empty());
    }

    #[test]
    fn lints_each_problem() {
        let table = CommandTable::new(vec![
            CommandEntry::new("ping", "pong"),
            CommandEntry::new("", "x"),
            CommandEntry::new("two words", "x"),
            CommandEntry::new("ping", "again"),
            CommandEntry::new("quiet", ""),
        ]);
        let lints = lint_commands(&table);
        assert_eq!(
            lints,
            vec![
                CommandLint::EmptyTrigger { index: 1 },
                CommandLint::WhitespaceInTrigger {
                    index: 2,
                    trigger: "two words".into()
                },
                CommandLint::DuplicateTrigger {
                    index: 3,
                    first_index: 0,
                    trigger: "ping".into()
                },
                CommandLint::EmptyResponse {
                    index: 4,
                    trigger: "quiet".into()
                },
            ]
        );
        assert_eq!(
            lints[2].to_string(),
            "command #4 trigger 'ping' is shadowed by command #1"
        );
    }

    #[test]
    fn short_text_is_borrowed() {
        assert!(matches!(fit_payload("pong", 233), Cow::Borrowed("pong")));
    }

    #[test]
    fn long_text_is_cut_with_marker() {
        let text = "a".repeat(300);
        let fitted = fit_payload(&text, 233);
        assert_eq!(fitted.len(), 233);
        assert!(fitted.ends_with("..."));
    }

    #[test]
    fn cut_respects_char_boundaries() {
        // 'é' is two bytes; a cut at byte 7 would split one
        let text = "éééééééééé";
        let fitted = fit_payload(text, 10);
        assert_eq!(fitted, "ééé...");
        assert!(fitted.len() <= 10);
    }

    #[test]
    fn tiny_limit_drops_marker() {
        assert_eq!(fit_payload("abcdef", 2), "ab");
    }
}
