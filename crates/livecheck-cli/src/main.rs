use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use livecheck_core::{ChallengeType, EngineConfig, FaceMatchResult};
use tracing_subscriber::EnvFilter;

mod reference;
mod replay;

/// Client-side liveness and face-match checks on still images.
#[derive(Parser, Debug)]
#[command(name = "livecheck", version, about)]
struct Cli {
    /// TOML configuration file ([liveness] and [matching] tables).
    /// Without it, LIVECHECK_* environment variables are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare a captured image against a reference image.
    Compare { captured: PathBuf, reference: PathBuf },

    /// Feed image files as consecutive frames into a liveness session.
    Replay {
        /// Frame images in capture order.
        #[arg(required = true)]
        frames: Vec<PathBuf>,

        /// Challenge to run; random when omitted.
        #[arg(long, value_enum)]
        challenge: Option<ChallengeArg>,
    },

    /// Enroll a reference image under a name.
    Enroll {
        name: String,
        image: PathBuf,

        /// Reference store directory.
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Compare a captured image against an enrolled reference.
    Verify {
        name: String,
        captured: PathBuf,

        /// Reference store directory.
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Print the effective configuration.
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ChallengeArg {
    Blink,
    HeadTurn,
}

impl From<ChallengeArg> for ChallengeType {
    fn from(arg: ChallengeArg) -> Self {
        match arg {
            ChallengeArg::Blink => ChallengeType::Blink,
            ChallengeArg::HeadTurn => ChallengeType::HeadTurn,
        }
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Compare {
            captured,
            reference,
        } => {
            let captured_img = image::open(&captured)
                .with_context(|| format!("failed to open {}", captured.display()))?;
            let reference_img = image::open(&reference)
                .with_context(|| format!("failed to open {}", reference.display()))?;
            let result =
                livecheck_core::compare_faces_with(&captured_img, &reference_img, &config.matching);
            print_match(&result, cli.json)?;
            Ok(match_exit_code(&result))
        }
        Command::Replay { frames, challenge } => {
            replay::run(&frames, challenge.map(Into::into), &config, cli.json)
        }
        Command::Enroll { name, image, store } => {
            reference::enroll(&name, &image, store, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify {
            name,
            captured,
            store,
        } => {
            let result = reference::verify(&name, &captured, store, &config)?;
            print_match(&result, cli.json)?;
            Ok(match_exit_code(&result))
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Load configuration from a TOML file, or from the environment.
fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            EngineConfig::from_toml_str(&text)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        }
        None => {
            let config = EngineConfig::from_env();
            config
                .validate()
                .context("invalid LIVECHECK_* environment configuration")?;
            config
        }
    };
    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

fn print_match(result: &FaceMatchResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(result)?);
    } else {
        let verdict = if result.matched { "MATCH" } else { "NO MATCH" };
        println!("{verdict} similarity={}% {}", result.similarity, result.message);
    }
    Ok(())
}

fn match_exit_code(result: &FaceMatchResult) -> ExitCode {
    if result.matched {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
