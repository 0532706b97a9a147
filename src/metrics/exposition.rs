//! Rendering of snapshots in the Prometheus [text exposition format].
//!
//! [text exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details

use std::fmt::Write;

use super::error::MetricsError;
use super::snapshot::{MetricFamily, Snapshot};

/// Content type served alongside rendered output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Renders every family of `snapshot`, in registration order.
///
/// Families without samples still get their `HELP`/`TYPE` lines. An empty
/// snapshot renders as an empty string.
///
/// # Errors
///
/// Returns [`MetricsError::MalformedSnapshot`] when a sample's label values do
/// not line up with its family's label names.
pub fn render(snapshot: &Snapshot) -> Result<String, MetricsError> {
    let mut buffer = String::new();
    for family in snapshot.families() {
        render_family(&mut buffer, family)?;
    }
    Ok(buffer)
}

fn render_family(buffer: &mut String, family: &MetricFamily) -> Result<(), MetricsError> {
    let name = family.identity().fully_qualified_name();

    write_help_line(buffer, &name, family.description());
    write_type_line(buffer, &name, family.kind().as_str());

    for (label_values, value) in family.samples() {
        if label_values.len() != family.label_names().len() {
            return Err(MetricsError::MalformedSnapshot(format!(
                "sample of '{}' has {} label values for {} label names",
                name,
                label_values.len(),
                family.label_names().len()
            )));
        }
        write_metric_line(buffer, &name, family.label_names(), label_values, value);
    }
    Ok(())
}

fn write_help_line(buffer: &mut String, name: &str, desc: &str) {
    buffer.push_str("# HELP ");
    buffer.push_str(name);
    if !desc.is_empty() {
        buffer.push(' ');
        buffer.push_str(&escape_description(desc));
    }
    buffer.push('\n');
}

fn write_type_line(buffer: &mut String, name: &str, metric_type: &str) {
    buffer.push_str("# TYPE ");
    buffer.push_str(name);
    buffer.push(' ');
    buffer.push_str(metric_type);
    buffer.push('\n');
}

fn write_metric_line(
    buffer: &mut String,
    name: &str,
    label_names: &[String],
    label_values: &[String],
    value: f64,
) {
    buffer.push_str(name);

    if !label_names.is_empty() {
        buffer.push('{');
        for (i, (key, val)) in label_names.iter().zip(label_values).enumerate() {
            if i > 0 {
                buffer.push(',');
            }
            // Writing into a String cannot fail.
            let _ = write!(buffer, "{}=\"{}\"", key, escape_label_value(val));
        }
        buffer.push('}');
    }

    buffer.push(' ');
    buffer.push_str(&format_value(value));
    buffer.push('\n');
}

/// Formats a sample value in its shortest canonical decimal form.
///
/// Integral values carry no decimal point, negative zero collapses to `0`, and
/// non-finite values use the exposition format's spellings.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}

/// Escapes a label value: backslash, double quote and line feed.
pub fn escape_label_value(value: &str) -> String {
    escape(value, true)
}

/// Escapes a `HELP` description: backslash and line feed.
pub fn escape_description(value: &str) -> String {
    escape(value, false)
}

fn escape(value: &str, quotes: bool) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '"' if quotes => escaped.push_str("\\\""),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Checks a metric name (or namespace) against `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if valid_metric_name_start_character(c) => {
            chars.all(valid_metric_name_character)
        }
        _ => false,
    }
}

/// Checks a label name against `[a-zA-Z_][a-zA-Z0-9_]*`, rejecting the reserved `__` prefix.
pub fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if valid_label_key_start_character(c) => chars.all(valid_label_key_character),
        _ => false,
    }
}

#[inline]
fn valid_metric_name_start_character(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

#[inline]
fn valid_metric_name_character(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

#[inline]
fn valid_label_key_start_character(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[inline]
fn valid_label_key_character(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
