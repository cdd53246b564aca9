//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use crate::circuit::{BiasSearch, TriodeCommonCathode};
use crate::device::Device;
use crate::domain::ParameterRow;
use crate::fit::FitSelection;
use crate::io::ingest::IngestedSamples;
use crate::report::SampleResidual;

/// Render a value with 3 decimals, then drop trailing zeros (and a bare point).
///
/// `1.500` -> `1.5`, `100.000` -> `100`, `0.0004` -> `0`.
pub fn format_value(value: f64) -> String {
    let s = format!("{value:.3}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// `label value` lines, one per row.
pub fn format_parameter_rows(rows: &[ParameterRow]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&format!("  {:<18} {}\n", row.label, format_value(row.value)));
    }
    out
}

/// Format the full fit summary (samples + candidate diagnostics + chosen model).
pub fn format_fit_summary(device: &Device, selection: &FitSelection, ingest: &IngestedSamples) -> String {
    let mut out = String::new();

    out.push_str("=== tubefit - Triode Model Fit ===\n");
    out.push_str(&format!("Device: {}\n", device.name()));
    out.push_str(&format!(
        "Samples: n={} (rows read {}, skipped {})\n",
        ingest.rows_used(),
        ingest.rows_read,
        ingest.row_errors.len()
    ));

    out.push_str("\nModel diagnostics:\n");
    for fit in &selection.fits {
        let chosen = if fit.index == selection.best { "*" } else { " " };
        out.push_str(&format!(
            "{chosen} {:<15} SSE={:.6} RMSE={:.4}mA BIC={:.3} iterations={} {}\n",
            fit.report.model.display_name(),
            fit.report.sse(),
            fit.report.rmse(),
            fit.bic,
            fit.report.iterations,
            if fit.report.is_usable() { "converged" } else { "NOT CONVERGED" },
        ));
    }
    for (kind, reason) in &selection.skipped {
        out.push_str(&format!("  (skipped {}) {reason}\n", kind.display_name()));
    }

    if let Some(model) = device.models().get(selection.best) {
        out.push_str("\nChosen model:\n");
        out.push_str(&format!("- {}\n", model.name()));
        out.push_str(&format_parameter_rows(&model.parameter_rows()));
    }
    if let Some(best) = selection.best_fit() {
        out.push_str(&format!("- {}\n", best.report.brief_report()));
    }
    out.push('\n');

    out
}

/// Format a residual table.
pub fn format_residual_table(rows: &[SampleResidual]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>10} {:>8} {:>10} {:>10} {:>10}\n",
            "va", "vg1", "ia_obs", "ia_fit", "residual"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<10} {:-<8} {:-<10} {:-<10} {:-<10}", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in rows {
        out.push_str(&format!(
            "{:>10.2} {:>8.3} {:>10.4} {:>10.4} {:>10.4}\n",
            r.sample.va, r.sample.vg1, r.sample.ia, r.ia_fit, r.residual
        ));
    }

    out
}

/// Format a bias search outcome with the circuit's parameters.
pub fn format_bias_summary(device: &Device, circuit: &TriodeCommonCathode, search: &BiasSearch) -> String {
    let mut out = String::new();

    out.push_str("=== tubefit - Common Cathode Bias ===\n");
    out.push_str(&format!(
        "Device: {} ({})\n",
        device.name(),
        device.selected_model().map_or("no model", |m| m.name())
    ));

    match &search.bias {
        Some(point) => out.push_str(&format!(
            "Bias point: Vk={} V, Va={} V, Ia={} mA (load line deviation {} mA)\n",
            format_value(point.vg),
            format_value(point.va),
            format_value(point.ia),
            format_value(point.deviation),
        )),
        None => out.push_str("Bias point: none within the device's ia_max of the load line\n"),
    }

    out.push_str("\nCircuit:\n");
    out.push_str(&format_parameter_rows(&circuit.parameter_rows()));

    out
}
