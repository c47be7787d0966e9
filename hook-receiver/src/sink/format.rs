//! Rendering of payload entries into log lines.

use chrono::{DateTime, Local, SecondsFormat};
use serde::Serialize;

use crate::config::Formatter;

/// One accepted hook payload.
#[derive(Debug, Clone)]
pub struct PayloadEntry {
    pub time: DateTime<Local>,
    pub message: String,
    /// Set when the request body could not be read completely.
    pub read_error: Option<String>,
}

impl PayloadEntry {
    pub fn new(body: &[u8]) -> Self {
        Self {
            time: Local::now(),
            message: String::from_utf8_lossy(body).into_owned(),
            read_error: None,
        }
    }

    /// Entry for a request whose body failed to read; the payload is empty.
    pub fn unreadable(error: impl ToString) -> Self {
        Self {
            time: Local::now(),
            message: String::new(),
            read_error: Some(error.to_string()),
        }
    }

    fn timestamp(&self) -> String {
        self.time.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// JSON line layout; keys are kept in alphabetical order.
#[derive(Serialize)]
struct JsonLine<'a> {
    level: &'static str,
    msg: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    read_error: Option<&'a str>,
    time: String,
}

impl Formatter {
    /// Render `entry` as a single newline-terminated line.
    pub fn render(&self, entry: &PayloadEntry) -> String {
        match self {
            Formatter::Plain => {
                let mut line = format!(
                    "time={} level=info msg={}",
                    quote(&entry.timestamp()),
                    quote(&entry.message)
                );
                if let Some(err) = &entry.read_error {
                    line.push_str(" read_error=");
                    line.push_str(&quote(err));
                }
                line.push('\n');
                line
            }
            Formatter::Json => {
                let json = JsonLine {
                    level: "info",
                    msg: &entry.message,
                    read_error: entry.read_error.as_deref(),
                    time: entry.timestamp(),
                };
                // Serializing borrowed strings into a String cannot fail.
                let mut line = serde_json::to_string(&json).unwrap_or_default();
                line.push('\n');
                line
            }
        }
    }
}

/// Quote a value unless it consists only of safe bare-word characters.
fn quote(value: &str) -> String {
    if needs_quoting(value) {
        go_quote(value)
    } else {
        value.to_string()
    }
}

/// Double-quoted string using Go `%q` escapes, as logrus text lines do.
fn go_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0b}' => out.push_str("\\v"),
            c if c < ' ' || c == '\u{7f}' => out.push_str(&format!("\\x{:02x}", c as u32)),
            c if c.is_control() || (c.is_whitespace() && c != ' ') => {
                let code = c as u32;
                if code <= 0xffff {
                    out.push_str(&format!("\\u{:04x}", code));
                } else {
                    out.push_str(&format!("\\U{:08x}", code));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || !value.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '/' | '@' | '^' | '+')
        })
}
