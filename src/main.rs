//! FteRunner CLI Entry Point
//!
//! # Usage
//!
//! ```bash
//! # Sampled batch run of every unit in the plan
//! fterunner plan.yaml
//!
//! # Fewer iterations, different log file
//! fterunner plan.yaml --iterations 5 --output /tmp/usage.json
//!
//! # One child process per unit invocation, no sampling by the parent
//! fterunner plan.yaml --spawn
//!
//! # Run a single unit once, unsampled (used by --spawn children)
//! fterunner plan.yaml --unit capacity
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colored::Colorize;
use log::{error, info};

use fterunner::error::PlanError;
use fterunner::execution::{run_unsampled, BatchReport, Orchestrator, Spawner};
use fterunner::plan::{load_plan, RunPlan};
use fterunner::{APP_NAME, VERSION};

/// Default plan file used when none is specified.
const DEFAULT_PLAN: &str = "plan.yaml";

/// How the plan's units are driven.
#[derive(Debug, PartialEq)]
enum Mode {
    Batch,
    Spawn,
    Single(String),
}

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    plan_path: String,
    mode: Mode,
    iterations: Option<usize>,
    output: Option<PathBuf>,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plan_path: DEFAULT_PLAN.to_string(),
            mode: Mode::Batch,
            iterations: None,
            output: None,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Sampled Batch Runner");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: fterunner [OPTIONS] <PLAN_FILE>");
    println!();
    println!("Arguments:");
    println!("  <PLAN_FILE>         Path to run plan YAML file (default: {})", DEFAULT_PLAN);
    println!();
    println!("Options:");
    println!("  --spawn             Run each unit as a child process, without sampling");
    println!("  --unit NAME         Run a single unit once, unsampled, and exit");
    println!("  --iterations N      Override the plan's iteration count");
    println!("  --output PATH       Override the resource log file");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  fterunner plan.yaml");
    println!("  fterunner plan.yaml --iterations 10 --output usage.json");
    println!("  fterunner plan.yaml --spawn");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional_index = 0;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--spawn" => {
                if matches!(config.mode, Mode::Single(_)) {
                    return Err("--spawn cannot be combined with --unit".to_string());
                }
                config.mode = Mode::Spawn;
            }
            "--unit" => {
                i += 1;
                if i >= args.len() {
                    return Err("--unit requires a unit name".to_string());
                }
                if config.mode == Mode::Spawn {
                    return Err("--spawn cannot be combined with --unit".to_string());
                }
                config.mode = Mode::Single(args[i].clone());
            }
            "--iterations" => {
                i += 1;
                if i >= args.len() {
                    return Err("--iterations requires a number argument".to_string());
                }
                let n: usize = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid iterations value: {}", args[i]))?;
                if n == 0 {
                    return Err("--iterations must be at least 1".to_string());
                }
                config.iterations = Some(n);
            }
            "--output" => {
                i += 1;
                if i >= args.len() {
                    return Err("--output requires a path argument".to_string());
                }
                config.output = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                match positional_index {
                    0 => config.plan_path = arg.clone(),
                    _ => return Err(format!("Unexpected argument: {}", arg)),
                }
                positional_index += 1;
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Runs all units for all iterations under the sampler.
fn run_batch(plan: &RunPlan) -> BatchReport {
    let report = Orchestrator::from_plan(plan).run();

    if report.failed > 0 {
        info!("{} of {} unit runs failed", report.failed, report.invocations());
    }
    report
}

/// Spawns one child per unit invocation.
fn run_spawned(plan: &RunPlan, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let exe = env::current_exe()?;

    let mut passthrough = Vec::new();
    if config.verbose {
        passthrough.push("--verbose".to_string());
    }

    Spawner::from_plan(plan, Path::new(&config.plan_path), &exe, &passthrough).run();
    Ok(())
}

/// Runs one unit once, unsampled. Fails if the unit fails.
fn run_single(plan: &RunPlan, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let unit = plan
        .unit(name)
        .ok_or_else(|| PlanError::UnknownUnit(name.to_string()))?;
    let label = unit.label();

    match run_unsampled(unit) {
        Ok(elapsed) => {
            println!("{} ran successfully.", label.green());
            println!("Execution time: {:.4}s", elapsed.as_secs_f64());
            Ok(())
        }
        Err(e) => {
            error!("Unit '{}' failed: {}", name, e);
            println!("{} {}: {}", "An error occurred while running".red(), label, e);
            Err(format!("Unit '{}' failed", label).into())
        }
    }
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);

    if config.mode == Mode::Batch {
        print_banner();
    }

    let mut plan = load_plan(&config.plan_path).map_err(|e| {
        error!("Failed to load plan: {}", e);
        format!("Could not load plan from '{}': {}", config.plan_path, e)
    })?;

    if let Some(n) = config.iterations {
        plan.iterations = n;
    }
    if let Some(output) = &config.output {
        plan.output = output.clone();
    }

    info!(
        "Plan loaded: {} units, {} iterations, output {}",
        plan.units.len(),
        plan.iterations,
        plan.output.display()
    );

    match &config.mode {
        Mode::Batch => {
            run_batch(&plan);
            Ok(())
        }
        Mode::Spawn => run_spawned(&plan, &config),
        Mode::Single(name) => run_single(&plan, name),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
