//! Flowsheet string tool.
//!
//! # Usage
//!
//! ```bash
//! # Decode a flowsheet string into its equipment
//! flowsheet decode FTHxaCCompHxaHPEnd
//!
//! # Encode equipment codes or names
//! flowsheet encode H Hx C Dc End
//!
//! # Compact form for logs
//! flowsheet simplify FTHxaCCompHxaHPEnd
//!
//! # Mask for a stage and history
//! flowsheet mask distillation --pressure 1.0 --history M1,DC1
//!
//! # Validate an environment config
//! flowsheet check-config env.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use flowsynth::masking::{action_mask, HistoryFlags};
use flowsynth::{simplify, EnvConfig, EquipmentRegistry, FlowsheetCodec, ProcessStage};

#[derive(Parser)]
#[command(name = "flowsheet")]
#[command(version)]
#[command(about = "Encode, decode and inspect chemical flowsheet strings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a flowsheet string into equipment
    Decode {
        text: String,
    },

    /// Join equipment codes or names into a flowsheet string
    Encode {
        #[arg(required = true)]
        equipment: Vec<String>,
    },

    /// Lossy compact form of a flowsheet string
    Simplify {
        text: String,
    },

    /// Action mask for a stage, stream pressure and history
    Mask {
        #[arg(value_enum)]
        stage: StageArg,

        /// Pressure of the newest stream
        #[arg(long, default_value_t = 1.0)]
        pressure: f64,

        /// Comma-separated instance labels placed so far
        #[arg(long, value_delimiter = ',')]
        history: Vec<String>,
    },

    /// Parse and validate an environment config file
    CheckConfig {
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StageArg {
    Preparation,
    Reaction,
    Cooling,
    Distillation,
    Pure,
}

impl From<StageArg> for ProcessStage {
    fn from(stage: StageArg) -> Self {
        match stage {
            StageArg::Preparation => ProcessStage::Preparation,
            StageArg::Reaction => ProcessStage::Reaction,
            StageArg::Cooling => ProcessStage::Cooling,
            StageArg::Distillation => ProcessStage::Distillation,
            StageArg::Pure => ProcessStage::Pure,
        }
    }
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let registry = EquipmentRegistry::standard();
    let codec = FlowsheetCodec::new(&registry);

    match cli.command {
        Commands::Decode { text } => {
            let kinds = codec.decode(&text).map_err(|e| e.to_string())?;
            debug!(text = %text, units = kinds.len(), "decoded");
            if cli.json {
                let units: Vec<_> = kinds
                    .iter()
                    .map(|&kind| {
                        json!({
                            "kind": kind,
                            "code": registry.code_of(kind),
                            "name": registry.name_of(kind),
                            "role": registry.role_of(kind),
                        })
                    })
                    .collect();
                println!("{}", serde_json::Value::Array(units));
            } else {
                for kind in kinds {
                    println!(
                        "{:>4}  {:<5} {} ({})",
                        kind.0,
                        registry.code_of(kind),
                        registry.name_of(kind),
                        registry.role_of(kind).tag()
                    );
                }
            }
        }
        Commands::Encode { equipment } => {
            let kinds = equipment
                .iter()
                .map(|item| {
                    registry
                        .kind_of_code(item)
                        .or_else(|| registry.kind_of_name(item))
                        .ok_or_else(|| format!("unknown equipment '{item}'"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let text = codec.encode(&kinds).map_err(|e| e.to_string())?;
            if cli.json {
                println!("{}", json!({ "flowsheet": text, "simplified": simplify(&text) }));
            } else {
                println!("{text}");
            }
        }
        Commands::Simplify { text } => {
            // Validate first so typos are reported instead of silently dropped
            codec.decode(&text).map_err(|e| e.to_string())?;
            println!("{}", simplify(&text));
        }
        Commands::Mask { stage, pressure, history } => {
            let stage = ProcessStage::from(stage);
            let mask = action_mask(stage, pressure, &HistoryFlags::from_labels(&history));
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "stage": stage,
                        "mask": mask.as_array(),
                        "enabled": mask.enabled().collect::<Vec<_>>(),
                    })
                );
            } else {
                println!("{mask}");
                for slot in mask.enabled() {
                    println!("  {} {}", slot.index(), slot);
                }
            }
        }
        Commands::CheckConfig { path } => {
            let config = EnvConfig::from_path(&path).map_err(|e| e.to_string())?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&config).map_err(|e| e.to_string())?);
            } else {
                println!(
                    "{}: ok (max_iterations={}, purity={}, timeout={:?})",
                    path.display(),
                    config.max_iterations,
                    config.purity,
                    config.run_timeout()
                );
            }
        }
    }
    Ok(())
}
