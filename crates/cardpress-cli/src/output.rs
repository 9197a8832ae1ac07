//! CLI output rendering
//!
//! Two modes, selected by the global `--json` flag. Human output prints
//! status lines with glyphs; JSON output prints machine-readable
//! documents. Publish runs additionally stream progress events, and the
//! two modes diverge there: JSON emits each event as one compact
//! newline-delimited line so consumers can parse the stream
//! incrementally, while `print_json` stays pretty-printed for one-shot
//! documents like `status` and `playlists`.

use cardpress_core::domain::ProgressEvent;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Rendering surface shared by every command
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    /// One-shot JSON document; human output ignores it
    fn print_json(&self, value: &serde_json::Value);
    /// One publish progress event as a stream line; human output
    /// renders events itself and ignores this
    fn event_line(&self, event: &ProgressEvent);
}

/// Serializes a progress event as one newline-free JSON line
///
/// The compact form is the stream contract: one event per line, the
/// `type` tag first-class, no pretty-printing to split an event across
/// lines.
pub fn ndjson_line(event: &ProgressEvent) -> String {
    serde_json::to_string(event).unwrap_or_default()
}

/// Human-readable formatter: checkmarks on stdout, problems on stderr
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {}
    fn event_line(&self, _event: &ProgressEvent) {}
}

/// JSON formatter: status objects on the same streams as their human
/// counterparts, documents pretty-printed, events newline-delimited
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
    fn event_line(&self, event: &ProgressEvent) {
        println!("{}", ndjson_line(event));
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    if format.is_json() {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}
