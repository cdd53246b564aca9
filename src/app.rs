//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - turns them into run configs for the pipeline
//! - prints reports/plots

use std::str::FromStr;

use clap::Parser;
use tracing::Level;

use crate::cli::{BiasArgs, Cli, Command, CurrentArgs, FitArgs, PlotArgs, SynthArgs, VoltageArgs};
use crate::domain::{BiasConfig, FitConfig, ModelSpec, SynthConfig};
use crate::error::AppError;

pub mod pipeline;

/// Environment variable consulted when `--log-level` is absent.
pub const LOG_ENV: &str = "TUBEFIT_LOG";

/// Entry point for the `tubefit` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.log_level)?;

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Current(args) => handle_current(args),
        Command::Voltage(args) => handle_voltage(args),
        Command::Bias(args) => handle_bias(args),
        Command::Synth(args) => handle_synth(args),
        Command::Plot(args) => handle_plot(args),
    }
}

fn init_logging(flag: Option<Level>) -> Result<(), AppError> {
    let level = match flag {
        Some(level) => level,
        None => log_level_from_env(std::env::var(LOG_ENV).ok().as_deref())?,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Resolve the fallback log level from `TUBEFIT_LOG` (default `warn`).
pub fn log_level_from_env(value: Option<&str>) -> Result<Level, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(Level::WARN),
        Some(v) => Level::from_str(v).map_err(|_| AppError::new(2, format!("Invalid {LOG_ENV} value '{v}'."))),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let run = pipeline::run_fit(&config)?;

    println!(
        "{}",
        crate::report::format_fit_summary(&run.device, &run.selection, &run.ingest)
    );

    let worst = crate::report::largest_residuals(&run.residuals, 10);
    println!("Largest residuals:");
    println!("{}", crate::report::format_residual_table(&worst));

    if let Some(plot) = &run.plot {
        println!("{plot}");
    }

    Ok(())
}

fn handle_current(args: CurrentArgs) -> Result<(), AppError> {
    let ia = pipeline::run_current(&args.device, args.model, args.va, args.vg1, args.vg2)?;
    println!("{}", crate::report::format_value(ia));
    Ok(())
}

fn handle_voltage(args: VoltageArgs) -> Result<(), AppError> {
    let va = pipeline::run_voltage(&args.device, args.model, args.ia, args.vg1, args.vg2)?;
    println!("{}", crate::report::format_value(va));
    Ok(())
}

fn handle_bias(args: BiasArgs) -> Result<(), AppError> {
    let config = BiasConfig {
        device_path: args.device,
        model: args.model,
        vb: args.vb,
        ra: args.ra,
        rk: args.rk,
        plot: args.plot,
        plot_width: args.size.width,
        plot_height: args.size.height,
    };
    let run = pipeline::run_bias(&config)?;

    println!(
        "{}",
        crate::report::format_bias_summary(&run.device, &run.circuit, &run.search)
    );
    if let Some(plot) = &run.plot {
        println!("{plot}");
    }
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let model = args
        .model
        .to_kind()
        .ok_or_else(|| AppError::new(2, "synth needs a concrete model (simple, koren or improved-koren)."))?;
    let config = SynthConfig {
        template_path: args.template,
        model,
        noise: args.noise,
        seed: args.seed,
        out: args.out,
    };
    let count = pipeline::run_synth(&config)?;
    println!("Wrote {count} samples to {}", config.out.display());
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let plot = pipeline::run_plot(&args.device, args.model, args.size.width, args.size.height)?;
    println!("{plot}");
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        device_path: args.device.clone(),
        samples_path: args.samples.clone(),
        model_spec: args.model,
        plot: args.plot,
        plot_width: args.size.width,
        plot_height: args.size.height,
        output_device: args.output.clone(),
        export_residuals: args.export.clone(),
        export_report: args.report.clone(),
    }
}

/// `Some(kind)` for a concrete model flag; `auto` and no flag keep the device's choice.
pub(crate) fn model_override(spec: Option<ModelSpec>) -> Option<crate::domain::ModelKind> {
    spec.and_then(ModelSpec::to_kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_log_level_defaults_to_warn() {
        assert_eq!(log_level_from_env(None).unwrap(), Level::WARN);
        assert_eq!(log_level_from_env(Some("  ")).unwrap(), Level::WARN);
        assert_eq!(log_level_from_env(Some("debug")).unwrap(), Level::DEBUG);
        assert_eq!(log_level_from_env(Some("loud")).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn fit_config_carries_flags() {
        let cli = Cli::parse_from([
            "tubefit", "fit", "-d", "d.json", "-s", "s.csv", "--model", "koren", "--export", "r.csv", "--plot",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args);
        assert_eq!(config.model_spec, ModelSpec::Koren);
        assert!(config.plot);
        assert_eq!(config.export_residuals.as_deref(), Some(std::path::Path::new("r.csv")));
        assert!(config.output_device.is_none());
    }
}
