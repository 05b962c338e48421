//! Output formatting for text vs JSON rendering
//!
//! Every subcommand payload goes through [`OutputWriter`], so handlers never
//! branch on the output format themselves.

use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes command payloads in the selected format.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(payload, &mut handle)
    }

    /// Render a payload to any writer.
    ///
    /// `Text` delegates to [`Render::render_text`]; `Json` pretty-prints via `serde_json`.
    pub fn render_to<T: Render + Serialize>(
        &self,
        payload: &T,
        w: &mut dyn Write,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => payload.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Human-readable text rendering, implemented next to `Serialize` on every payload.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Payload {
        name: String,
        count: u32,
        #[serde(skip)]
        text_only: String,
    }

    impl Render for Payload {
        fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
            writeln!(w, "{} = {} ({})", self.name, self.count, self.text_only)
        }
    }

    fn payload() -> Payload {
        Payload {
            name: "rules".to_owned(),
            count: 3,
            text_only: "text only".to_owned(),
        }
    }

    fn render(format: OutputFormat) -> String {
        let mut buffer = Vec::new();
        OutputWriter::new(format)
            .render_to(&payload(), &mut buffer)
            .expect("rendering should succeed");
        String::from_utf8(buffer).expect("valid UTF-8")
    }

    #[test]
    fn test_text_format_uses_render() {
        assert_eq!(render(OutputFormat::Text), "rules = 3 (text only)\n");
    }

    #[test]
    fn test_json_format_uses_serialize() {
        let output = render(OutputFormat::Json);
        assert!(output.ends_with("}\n"), "json output should end with a newline");
        let parsed: serde_json::Value = serde_json::from_str(&output).expect("valid json");
        assert_eq!(parsed["name"].as_str(), Some("rules"));
        assert_eq!(parsed["count"].as_u64(), Some(3));
        assert!(parsed.get("text_only").is_none(), "skipped fields stay out of json");
    }

    #[test]
    fn test_json_format_is_pretty() {
        let output = render(OutputFormat::Json);
        assert!(output.contains("\n  \"name\""), "pretty JSON should be indented");
    }
}
