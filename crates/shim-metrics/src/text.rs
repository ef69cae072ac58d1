//! Prometheus text exposition format (version 0.0.4) helpers.

use std::fmt::Write;

use crate::desc::SeriesDesc;

/// Write the `# HELP` and `# TYPE` lines for a series.
pub(crate) fn write_header(out: &mut String, desc: &SeriesDesc) {
    let _ = writeln!(
        out,
        "# HELP {} {}",
        desc.fq_name(),
        escape_help(&desc.rendered_help())
    );
    let _ = writeln!(out, "# TYPE {} {}", desc.fq_name(), desc.kind());
}

/// Write one sample line.
///
/// `extra` is an additional label appended after the series labels
/// (`le` for histogram buckets, `quantile` for summaries).
pub(crate) fn write_sample(
    out: &mut String,
    name: &str,
    suffix: &str,
    label_names: &[String],
    label_values: &[String],
    extra: Option<(&str, &str)>,
    value: f64,
) {
    out.push_str(name);
    out.push_str(suffix);

    if !label_names.is_empty() || extra.is_some() {
        out.push('{');
        let mut first = true;
        for (label, value) in label_names.iter().zip(label_values) {
            if !first {
                out.push(',');
            }
            first = false;
            let _ = write!(out, "{}=\"{}\"", label, escape_label_value(value));
        }
        if let Some((label, value)) = extra {
            if !first {
                out.push(',');
            }
            let _ = write!(out, "{}=\"{}\"", label, value);
        }
        out.push('}');
    }

    out.push(' ');
    out.push_str(&format_value(value));
    out.push('\n');
}

/// Format a sample value the way Prometheus parses it.
pub(crate) fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{}", value)
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
