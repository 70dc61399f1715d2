//! Orbital CLI entry point.

mod executor;

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use orbital_ir::{
    OperatorMeta, OperatorRegistry, SExpr, StdModule, ValidationMode, Validator, format_validation_errors,
};
use orbital_runtime::{EffectQueue, EvaluationContext, Evaluator, RuntimeConfig};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::executor::Executor;

#[derive(Parser)]
#[command(name = "orbital")]
#[command(about = "Validate and evaluate Orbital S-expressions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Guard,
    Effect,
}

impl From<Mode> for ValidationMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Guard => ValidationMode::Guard,
            Mode::Effect => ValidationMode::Effect,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check an expression without running it
    Validate {
        /// Input S-expression file (or - for stdin)
        file: String,

        /// Guards may not contain effects
        #[arg(short, long, value_enum, default_value = "effect")]
        mode: Mode,
    },

    /// Evaluate an expression and run its effects
    Eval {
        /// Input S-expression file (or - for stdin)
        file: String,

        /// JSON file with the binding roots (entity, payload, state, ...)
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Runtime configuration (TOML)
        #[arg(long, default_value = "orbital.toml")]
        config: PathBuf,

        /// Evaluate as a guard and print the boolean result
        #[arg(long)]
        guard: bool,
    },

    /// List registered operators
    Ops {
        /// Only operators from this module (math, str, array, ...)
        #[arg(short, long)]
        module: Option<String>,

        /// Only operators with side effects
        #[arg(long, conflicts_with_all = ["pure", "lambda"])]
        effects: bool,

        /// Only operators without side effects
        #[arg(long, conflicts_with = "lambda")]
        pure: bool,

        /// Only operators that take a lambda
        #[arg(long)]
        lambda: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("orbital=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = OperatorRegistry::standard();

    match cli.command {
        Commands::Validate { file, mode } => {
            let expr = read_expr(&file)?;
            let result = Validator::new(&registry, mode.into()).validate(&expr);
            if !result.is_valid() {
                eprintln!("{}", format_validation_errors(&result));
                std::process::exit(1);
            }
            println!("{file}: ok");
        }

        Commands::Eval {
            file,
            context,
            config,
            guard,
        } => {
            let expr = read_expr(&file)?;
            let config = RuntimeConfig::load(&config)?;
            let ctx: EvaluationContext = match context {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => EvaluationContext::new(),
            };

            let mode = if guard { ValidationMode::Guard } else { ValidationMode::Effect };
            let result = Validator::new(&registry, mode).validate(&expr);
            if !result.is_valid() {
                eprintln!("{}", format_validation_errors(&result));
                std::process::exit(1);
            }

            let evaluator = Evaluator::new(&registry).with_config(config);
            if guard {
                println!("{}", evaluator.evaluate_guard(&expr, &ctx)?);
                return Ok(());
            }

            let queue = EffectQueue::new();
            let value = evaluator.evaluate(&expr, &ctx, &queue)?;
            let requests = queue.into_requests();
            info!(effects = requests.len(), "evaluated");

            let executor = Executor::new(serde_json::to_value(&ctx)?);
            let outcome = executor.run(requests).await?;
            let report = json!({
                "result": value,
                "effects": outcome.results,
                "clientEffects": outcome.client_effects,
                "state": outcome.state,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Ops {
            module,
            effects,
            pure,
            lambda,
        } => {
            let mut ops: Vec<&OperatorMeta> = match module {
                Some(name) => {
                    let module = StdModule::from_name(&name).ok_or_else(|| format!("unknown module: {name}"))?;
                    registry.operators_by_module(module)
                }
                None => registry.iter().collect(),
            };
            ops.retain(|op| {
                (!effects || op.side_effects) && (!pure || !op.side_effects) && (!lambda || op.accepts_lambda())
            });
            ops.sort_by_key(|op| op.name);
            for op in ops {
                println!("{:<24} {:<6} {}", op.name, arity(op), op.description);
            }
        }
    }

    Ok(())
}

fn read_expr(file: &str) -> Result<SExpr, Box<dyn std::error::Error>> {
    let input = if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(file)?
    };
    Ok(serde_json::from_str(&input)?)
}

fn arity(op: &OperatorMeta) -> String {
    match op.max_arity {
        Some(max) if max == op.min_arity => max.to_string(),
        Some(max) => format!("{}-{max}", op.min_arity),
        None => format!("{}+", op.min_arity),
    }
}
