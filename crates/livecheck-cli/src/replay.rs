//! `livecheck replay`: drive a liveness session from image files.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use livecheck_core::{open_frame, ChallengeType, EngineConfig, LivenessStatus, Session};

/// Feed `frames` in order and print every result. Succeeds only if the
/// session reaches `Alive`.
pub fn run(
    frames: &[PathBuf],
    challenge: Option<ChallengeType>,
    config: &EngineConfig,
    json: bool,
) -> Result<ExitCode> {
    Ok(if replay(frames, challenge, config, json)? {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Returns whether the last frame left the session `Alive`.
fn replay(
    frames: &[PathBuf],
    challenge: Option<ChallengeType>,
    config: &EngineConfig,
    json: bool,
) -> Result<bool> {
    let liveness = config.liveness.clone();
    let max_dim = liveness.frame_max_dim;
    let mut session = match challenge {
        Some(challenge) => Session::with_challenge(liveness, challenge),
        None => Session::with_config(liveness),
    }
    .context("invalid liveness configuration")?;

    if !json {
        println!(
            "challenge: {} ({})",
            session.challenge_type(),
            session.challenge_type().instruction()
        );
    }

    let mut alive = false;
    for (i, path) in frames.iter().enumerate() {
        let frame = open_frame(path, max_dim, i as u64)
            .with_context(|| format!("failed to load frame {}", path.display()))?;
        let result = session.add_frame(frame);

        if json {
            println!("{}", serde_json::to_string(&result)?);
        } else {
            println!(
                "{:>4} {:<10} {:>3} {}",
                result.frames_analyzed,
                format!("{:?}", result.status),
                result.score,
                result.message
            );
        }
        alive = result.status == LivenessStatus::Alive;
    }

    tracing::info!(alive, frames = frames.len(), "replay finished");
    Ok(alive)
}
