// Output formatting for CLI

use anyhow::Result;
use clap::ValueEnum;
use serde_json::Value;
use std::io::Write;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Pretty,
    /// Compact JSON, one document per line
    Json,
    KeyValue,
    Table,
}

/// Format and output data
pub struct OutputFormatter {
    format: OutputFormat,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    /// Render one JSON document in the selected format
    pub fn output(&self, value: &Value, writer: &mut impl Write) -> Result<()> {
        match self.format {
            OutputFormat::Pretty => writeln!(writer, "{}", serde_json::to_string_pretty(value)?)?,
            OutputFormat::Json => writeln!(writer, "{}", serde_json::to_string(value)?)?,
            OutputFormat::KeyValue => self.output_key_value(value, "", writer)?,
            OutputFormat::Table => self.output_table(value, writer)?,
        }
        Ok(())
    }

    /// Nested objects are flattened into dotted keys
    fn output_key_value(&self, value: &Value, prefix: &str, writer: &mut impl Write) -> Result<()> {
        match value {
            Value::Object(obj) => {
                for (key, value) in obj {
                    let key = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    self.output_key_value(value, &key, writer)?;
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.output_key_value(item, &format!("{}[{}]", prefix, i), writer)?;
                }
            }
            other => writeln!(writer, "{}={}", prefix, format_value(other))?,
        }
        Ok(())
    }

    fn output_table(&self, value: &Value, writer: &mut impl Write) -> Result<()> {
        let Some(obj) = value.as_object() else {
            writeln!(writer, "{}", format_value(value))?;
            return Ok(());
        };
        let width = obj.keys().map(|k| k.len()).max().unwrap_or(0) + 2;
        writeln!(writer, "{}", "=".repeat(width + 30))?;
        for (key, value) in obj {
            writeln!(writer, "{:<width$}{}", format!("{}:", key), format_value(value), width = width)?;
        }
        writeln!(writer, "{}", "=".repeat(width + 30))?;
        Ok(())
    }

    pub fn print_error(&self, message: &str) {
        eprintln!("✗ {}", message);
    }

    pub fn print_info(&self, message: &str) {
        if !self.quiet {
            eprintln!("  {}", message);
        }
    }
}

/// Scalar rendering for the line-oriented formats
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) if s.len() > 64 => format!("<{} bytes of text>", s.len()),
        Value::String(s) => s.clone(),
        Value::Null => "(none)".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(arr) if arr.is_empty() => "[]".to_string(),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{{} fields}}", obj.len()),
    }
}
