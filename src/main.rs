//! PolyScop Command Line Interface
//!
//! Usage:
//!   polyscop [OPTIONS] <input-file>
//!   polyscop --help
//!
//! Examples:
//!   polyscop region.json                          # Optimize, print the SCoP
//!   polyscop --parallelize-all --emit=schedule region.json
//!   polyscop --identity-transform --verbosity=2 region.json
//!   polyscop --emit=deps region.json              # Just the dependences

use clap::{ArgGroup, Parser, ValueEnum};
use polyscop::transform::SchedulePolicy;
use polyscop::utils::poly_print;
use polyscop::OptimizationConfig;
use std::path::PathBuf;
use std::fs;
use anyhow::{Result, Context};
use log::{info, debug};

/// PolyScop - polyhedral representation and scheduling of static control parts
#[derive(Parser, Debug)]
#[command(name = "polyscop")]
#[command(version)]
#[command(about = "Builds, analyzes and schedules the polyhedral model of a lifted region", long_about = None)]
#[command(group(ArgGroup::new("policy").args(["identity_transform", "parallelize_all", "optimize_isl"])))]
struct Cli {
    /// Lifted region description (JSON)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Rewrite every schedule to an equal one
    #[arg(long)]
    identity_transform: bool,

    /// Favor loops free of carried dependences
    #[arg(long)]
    parallelize_all: bool,

    /// Search for the best locality (default)
    #[arg(long)]
    optimize_isl: bool,

    /// Dump verbosity (0-2)
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u8).range(0..=2))]
    verbosity: u8,

    /// Deepest loop nest whose loops are permuted
    #[arg(long, default_value = "4")]
    permutation_depth: usize,

    /// Bound on intermediate constraint counts
    #[arg(long, default_value = "4096")]
    constraint_limit: usize,

    /// What to emit
    #[arg(long, default_value = "scop")]
    emit: EmitKind,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress warnings)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmitKind {
    /// The SCoP dump
    Scop,
    /// The twelve dependence relations
    Deps,
    /// Schedules and carried dimensions
    Schedule,
    /// All of the above
    All,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    info!("PolyScop v{}", polyscop::VERSION);
    debug!("Input file: {:?}", cli.input);

    let config = build_config(&cli);
    debug!("Optimization config: {:?}", config);

    let mut scop = polyscop::load_scop(&cli.input)?;
    info!("Scheduling {} statements...", scop.nb_statements());
    let changed = polyscop::optimize(&mut scop, &config)?;
    info!("Transform applied: {}", changed);

    let mut out = String::new();
    if matches!(cli.emit, EmitKind::Scop | EmitKind::All) {
        poly_print::print_scop(&mut out, &scop, config.verbosity)?;
    }
    if matches!(cli.emit, EmitKind::Deps | EmitKind::All) {
        if let Some(deps) = &scop.dependences {
            poly_print::print_dependences(&mut out, deps)?;
        }
    }
    if matches!(cli.emit, EmitKind::Schedule | EmitKind::All) {
        poly_print::print_schedules(&mut out, &scop)?;
    }
    write_output(&cli.output, &out)
}

fn build_config(cli: &Cli) -> OptimizationConfig {
    let policy = if cli.identity_transform {
        SchedulePolicy::Identity
    } else if cli.parallelize_all {
        SchedulePolicy::ParallelizeAll
    } else {
        SchedulePolicy::Optimize
    };

    OptimizationConfig {
        policy,
        verbosity: cli.verbosity,
        permutation_depth: cli.permutation_depth,
        constraint_limit: cli.constraint_limit,
    }
}

fn write_output(path: &Option<PathBuf>, content: &str) -> Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content)
                .with_context(|| format!("Failed to write output file: {:?}", p))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
