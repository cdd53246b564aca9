//! Command-line parsing for the triode model fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::Level;

use crate::domain::ModelSpec;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "tubefit", version, about = "Triode model fitter and bias point calculator")]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace). Falls back to `TUBEFIT_LOG`.
    #[arg(long, global = true)]
    pub log_level: Option<Level>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the device's models to measured samples and report the chosen one.
    Fit(FitArgs),
    /// Anode current (mA) of the device's selected model.
    Current(CurrentArgs),
    /// Anode voltage (V) that draws a given anode current.
    Voltage(VoltageArgs),
    /// Find the DC bias point of a common-cathode stage.
    Bias(BiasArgs),
    /// Generate synthetic samples from a sweep template.
    Synth(SynthArgs),
    /// Plot the device's anode characteristics.
    Plot(PlotArgs),
}

/// Terminal plot size, shared by the plotting subcommands.
#[derive(Debug, Args, Clone)]
pub struct PlotSize {
    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Device JSON providing limits and starting parameters.
    #[arg(short = 'd', long, value_name = "JSON")]
    pub device: PathBuf,

    /// Samples CSV (`va`, `vg1`, `ia` in mA, optional `vg2`).
    #[arg(short = 's', long, value_name = "CSV")]
    pub samples: PathBuf,

    /// Which model(s) to fit.
    #[arg(long, value_enum, default_value_t = ModelSpec::Auto)]
    pub model: ModelSpec,

    /// Write the fitted device JSON here.
    #[arg(short = 'o', long, value_name = "JSON")]
    pub output: Option<PathBuf>,

    /// Export per-sample residuals to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Write a fit report JSON.
    #[arg(long, value_name = "JSON")]
    pub report: Option<PathBuf>,

    /// Render the fitted characteristics over the samples.
    #[arg(long)]
    pub plot: bool,

    #[command(flatten)]
    pub size: PlotSize,
}

#[derive(Debug, Args, Clone)]
pub struct CurrentArgs {
    #[arg(short = 'd', long, value_name = "JSON")]
    pub device: PathBuf,

    /// Use this model instead of the device's default.
    #[arg(long, value_enum)]
    pub model: Option<ModelSpec>,

    /// Anode voltage (V).
    #[arg(long, allow_hyphen_values = true)]
    pub va: f64,

    /// Grid voltage (V), usually negative.
    #[arg(long, allow_hyphen_values = true)]
    pub vg1: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub vg2: f64,
}

#[derive(Debug, Args, Clone)]
pub struct VoltageArgs {
    #[arg(short = 'd', long, value_name = "JSON")]
    pub device: PathBuf,

    /// Use this model instead of the device's default.
    #[arg(long, value_enum)]
    pub model: Option<ModelSpec>,

    /// Target anode current (mA).
    #[arg(long, allow_hyphen_values = true)]
    pub ia: f64,

    /// Grid voltage (V), usually negative.
    #[arg(long, allow_hyphen_values = true)]
    pub vg1: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub vg2: f64,
}

#[derive(Debug, Args, Clone)]
pub struct BiasArgs {
    #[arg(short = 'd', long, value_name = "JSON")]
    pub device: PathBuf,

    /// Use this model instead of the device's default.
    #[arg(long, value_enum)]
    pub model: Option<ModelSpec>,

    /// Supply voltage (V).
    #[arg(long, default_value_t = 300.0)]
    pub vb: f64,

    /// Anode resistor (ohms).
    #[arg(long, default_value_t = 100_000.0)]
    pub ra: f64,

    /// Cathode resistor (ohms).
    #[arg(long, default_value_t = 1000.0)]
    pub rk: f64,

    /// Render the load line and bias curve.
    #[arg(long)]
    pub plot: bool,

    #[command(flatten)]
    pub size: PlotSize,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Sweep template JSON.
    #[arg(short = 't', long, value_name = "JSON")]
    pub template: PathBuf,

    /// Model family generating the currents.
    #[arg(long, value_enum, default_value_t = ModelSpec::ImprovedKoren)]
    pub model: ModelSpec,

    /// Relative Gaussian noise on ia (0 disables noise).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output samples CSV.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub out: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    #[arg(short = 'd', long, value_name = "JSON")]
    pub device: PathBuf,

    /// Plot this model instead of the device's default.
    #[arg(long, value_enum)]
    pub model: Option<ModelSpec>,

    #[command(flatten)]
    pub size: PlotSize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_defaults_to_auto_selection() {
        let cli = Cli::parse_from(["tubefit", "fit", "-d", "12ax7.json", "-s", "samples.csv"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.model, ModelSpec::Auto);
        assert!(!args.plot);
        assert_eq!(args.size.width, 100);
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn negative_grid_voltage_and_global_log_level() {
        let cli = Cli::parse_from([
            "tubefit", "current", "-d", "d.json", "--va", "250", "--vg1", "-2", "--log-level", "debug",
        ]);
        let Command::Current(args) = cli.command else {
            panic!("expected current");
        };
        assert_eq!(args.vg1, -2.0);
        assert_eq!(args.va, 250.0);
        assert_eq!(cli.log_level, Some(Level::DEBUG));
    }

    #[test]
    fn model_names_are_kebab_case() {
        let cli = Cli::parse_from(["tubefit", "synth", "-t", "t.json", "-o", "out.csv", "--model", "koren"]);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.model, ModelSpec::Koren);

        let cli = Cli::parse_from(["tubefit", "plot", "-d", "d.json", "--model", "improved-koren"]);
        let Command::Plot(args) = cli.command else {
            panic!("expected plot");
        };
        assert_eq!(args.model, Some(ModelSpec::ImprovedKoren));
    }
}
