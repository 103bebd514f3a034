//! Command dispatch: turns an inbound message body into an optional reply.
//!
//! The first whitespace-delimited word selects a table entry (first match wins) and the
//! entry's template is rendered with the packet's signal readings. Two "no content"
//! outcomes are deliberately different:
//!
//! - an empty or whitespace-only message is answered with [`EMPTY_COMMAND_REPLY`]
//! - a non-empty message whose first word matches nothing gets no reply at all
//!
//! Dispatch is pure: it reads the table and the message, nothing else.

use super::signal::SignalMetrics;
use super::table::CommandTable;
use super::template::{render, TemplateVars};
use crate::logutil::escape_log;
use log::debug;

pub const EMPTY_COMMAND_REPLY: &str = "Empty command.";

/// A message split into its command word and the remaining words.
///
/// Arguments are carried along for future commands that take parameters; none of the
/// table-driven responses use them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub name: &'a str,
    pub args: Vec<&'a str>,
}

/// Word separators: Unicode whitespace plus the ASCII information separators
/// `\x1c`..=`\x1f`.
pub fn is_word_separator(c: char) -> bool {
    c.is_whitespace() || ('\x1c'..='\x1f').contains(&c)
}

impl<'a> ParsedCommand<'a> {
    /// `None` when the message has no words.
    pub fn parse(message: &'a str) -> Option<Self> {
        let mut words = message.split(is_word_separator).filter(|w| !w.is_empty());
        let name = words.next()?;
        Some(Self {
            name,
            args: words.collect(),
        })
    }
}

/// Stateless dispatcher over a borrowed command table.
#[derive(Debug, Clone, Copy)]
pub struct CommandDispatcher<'t> {
    table: &'t CommandTable,
}

impl<'t> CommandDispatcher<'t> {
    pub fn new(table: &'t CommandTable) -> Self {
        Self { table }
    }

    /// Produce the reply for `message`, if one is warranted.
    pub fn handle(&self, message: &str, metrics: &SignalMetrics) -> Option<String> {
        handle(message, metrics, self.table)
    }
}

/// Produce the reply for `message`, if one is warranted.
pub fn handle(message: &str, metrics: &SignalMetrics, table: &CommandTable) -> Option<String> {
    let parsed = match ParsedCommand::parse(message) {
        Some(parsed) => parsed,
        None => return Some(EMPTY_COMMAND_REPLY.to_string()),
    };

    let entry = table.find(parsed.name)?;
    Some(render_response(&entry.response, metrics))
}

/// Render a response template; any rendering error yields the template unchanged.
pub fn render_response(template: &str, metrics: &SignalMetrics) -> String {
    let rssi_msg = metrics.rssi_msg();
    let snr_msg = metrics.snr_msg();
    let vars = TemplateVars {
        rssi_msg: &rssi_msg,
        snr_msg: &snr_msg,
    };
    match render(template, &vars) {
        Ok(text) => text,
        Err(e) => {
            debug!(
                "Template '{}' not rendered ({}); sending it verbatim",
                escape_log(template),
                e
            );
            template.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::table::CommandEntry;

    fn table() -> CommandTable {
        CommandTable::new(vec![
            CommandEntry::new("ping", "pong {rssi_msg} {snr_msg}"),
            CommandEntry::new("plain", "just text"),
            CommandEntry::new("ping", "never used"),
        ])
    }

    #[test]
    fn parse_splits_name_and_args() {
        let parsed = ParsedCommand::parse("  ping  a b\tc ").unwrap();
        assert_eq!(parsed.name, "ping");
        assert_eq!(parsed.args, vec!["a", "b", "c"]);
        assert!(ParsedCommand::parse(" \t\n").is_none());
    }

    #[test]
    fn ascii_separators_split_words() {
        let parsed = ParsedCommand::parse("ping\x1ca\x1fb").unwrap();
        assert_eq!(parsed.name, "ping");
        assert_eq!(parsed.args, vec!["a", "b"]);
        assert!(ParsedCommand::parse("\x1c\x1d\x1e\x1f").is_none());
        assert_eq!(
            handle("\x1f", &SignalMetrics::default(), &table()).as_deref(),
            Some(EMPTY_COMMAND_REPLY)
        );
        assert_eq!(
            handle("plain\x1e", &SignalMetrics::default(), &table()).as_deref(),
            Some("just text")
        );
    }

    #[test]
    fn format_specs_apply_to_signal_values() {
        let t = CommandTable::new(vec![
            CommandEntry::new("sig", "[{rssi_msg:>12}] [{snr_msg:.3}] {rssi_msg!r}"),
            CommandEntry::new("bad", "[{rssi_msg:+}] {battery}"),
        ]);
        let metrics = SignalMetrics::new(Some(-97.0), Some(6.25));
        assert_eq!(
            handle("sig", &metrics, &t).as_deref(),
            Some("[   -97.0 dBm] [6.2] '-97.0 dBm'")
        );
        assert_eq!(
            handle("bad", &metrics, &t).as_deref(),
            Some("[{rssi_msg:+}] {battery}")
        );
    }

    #[test]
    fn empty_message_gets_empty_command_reply() {
        let t = table();
        assert_eq!(
            handle("", &SignalMetrics::default(), &t).as_deref(),
            Some(EMPTY_COMMAND_REPLY)
        );
        assert_eq!(
            handle("   \n ", &SignalMetrics::default(), &t).as_deref(),
            Some(EMPTY_COMMAND_REPLY)
        );
    }

    #[test]
    fn empty_message_replies_even_with_empty_table() {
        let empty = CommandTable::default();
        assert_eq!(
            handle(" ", &SignalMetrics::default(), &empty).as_deref(),
            Some(EMPTY_COMMAND_REPLY)
        );
        assert_eq!(handle("ping", &SignalMetrics::default(), &empty), None);
    }

    #[test]
    fn unknown_command_gets_no_reply() {
        assert_eq!(handle("pong", &SignalMetrics::default(), &table()), None);
    }

    #[test]
    fn first_matching_entry_wins() {
        let metrics = SignalMetrics::new(Some(-80.0), Some(7.5));
        let reply = handle("ping extra words", &metrics, &table()).unwrap();
        assert_eq!(reply, "pong -80.0 dBm 7.5 dB");
    }

    #[test]
    fn template_without_placeholders_is_returned_as_is() {
        let reply = handle("plain", &SignalMetrics::default(), &table()).unwrap();
        assert_eq!(reply, "just text");
    }

    #[test]
    fn dispatcher_wraps_table() {
        let t = table();
        let dispatcher = CommandDispatcher::new(&t);
        assert_eq!(
            dispatcher.handle("plain", &SignalMetrics::default()).as_deref(),
            Some("just text")
        );
    }
}
