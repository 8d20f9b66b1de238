//! Rendered-height signal for hosts embedding the browser.
//!
//! When embedded, the height is written as one JSON line on stderr whenever it changes.
//! Emission is best effort: write failures are ignored.

use serde::Serialize;
use std::io::{IsTerminal, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeMessage {
    pub kind: &'static str,
    pub height: u16,
}

impl SizeMessage {
    pub fn new(height: u16) -> Self {
        Self {
            kind: "sl-size",
            height,
        }
    }
}

#[derive(Debug, Default)]
pub struct EmbedSignal {
    enabled: bool,
    last: Option<u16>,
}

impl EmbedSignal {
    /// Enabled only in embed mode with stderr redirected away from the terminal.
    pub fn new(embed: bool) -> Self {
        Self {
            enabled: embed && !std::io::stderr().is_terminal(),
            last: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Write the message to `out` if enabled and the height changed. Returns whether it was sent.
    pub fn report_to<W: Write>(&mut self, height: u16, out: &mut W) -> bool {
        if !self.enabled || self.last == Some(height) {
            return false;
        }
        self.last = Some(height);
        let Ok(line) = serde_json::to_string(&SizeMessage::new(height)) else {
            return false;
        };
        writeln!(out, "{}", line).and_then(|_| out.flush()).is_ok()
    }

    pub fn report(&mut self, height: u16) -> bool {
        self.report_to(height, &mut std::io::stderr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_shape() {
        let json = serde_json::to_string(&SizeMessage::new(42)).unwrap();
        assert_eq!(json, r#"{"kind":"sl-size","height":42}"#);
    }

    #[test]
    fn test_only_changes_are_reported() {
        let mut signal = EmbedSignal {
            enabled: true,
            last: None,
        };
        let mut out = Vec::new();
        assert!(signal.report_to(30, &mut out));
        assert!(!signal.report_to(30, &mut out));
        assert!(signal.report_to(31, &mut out));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_disabled_signal_is_silent() {
        let mut signal = EmbedSignal::default();
        let mut out = Vec::new();
        assert!(!signal.report_to(10, &mut out));
        assert!(out.is_empty());
    }
}
