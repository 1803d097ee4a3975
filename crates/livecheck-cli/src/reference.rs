//! `livecheck enroll` / `livecheck verify`: reference store commands.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use livecheck_core::{EngineConfig, FaceMatchResult};
use livecheck_reference::ReferenceStore;

/// Determine the reference store directory.
///
/// `$LIVECHECK_STORE_DIR` if set, otherwise
/// `$XDG_DATA_HOME/livecheck/references` (~/.local/share/livecheck/references).
fn default_store_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LIVECHECK_STORE_DIR") {
        return PathBuf::from(dir);
    }
    let data_home = std::env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        format!("{home}/.local/share")
    });
    PathBuf::from(data_home).join("livecheck/references")
}

fn open_store(dir: Option<PathBuf>) -> ReferenceStore {
    ReferenceStore::new(dir.unwrap_or_else(default_store_dir))
}

/// Validate that `image` decodes, then store it as the reference for `name`.
pub fn enroll(name: &str, image: &Path, store: Option<PathBuf>, json: bool) -> Result<()> {
    let bytes =
        fs::read(image).with_context(|| format!("failed to read {}", image.display()))?;
    image::load_from_memory(&bytes)
        .with_context(|| format!("{} is not a decodable image", image.display()))?;

    let store = open_store(store);
    let digest = store
        .enroll(name, &bytes)
        .with_context(|| format!("failed to enroll {name}"))?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "name": name, "sha256": digest, "store": store.dir() })
        );
    } else {
        println!("Enrolled {name} ({digest})");
        println!("Store: {}", store.dir().display());
    }
    Ok(())
}

/// Compare `captured` against the integrity-checked reference for `name`.
pub fn verify(
    name: &str,
    captured: &Path,
    store: Option<PathBuf>,
    config: &EngineConfig,
) -> Result<FaceMatchResult> {
    let store = open_store(store);
    let reference = store
        .load(name)
        .with_context(|| format!("failed to load reference {name}"))?;
    let captured_bytes =
        fs::read(captured).with_context(|| format!("failed to read {}", captured.display()))?;

    let result =
        livecheck_core::compare_face_bytes_with(&captured_bytes, &reference, &config.matching)
            .context("failed to decode images")?;
    tracing::info!(name, similarity = result.similarity, matched = result.matched, "verify");
    Ok(result)
}
