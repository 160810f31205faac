use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use toml::{map::Map, Value};
use tracing::debug;

fn locate_workspace(cargo: &str) -> anyhow::Result<PathBuf> {
    let output = std::process::Command::new(cargo)
        .arg("locate-project")
        .arg("--workspace")
        .arg("--message-format=plain")
        .output()
        .with_context(|| format!("failed to run {} locate-project", cargo))?;

    ensure!(
        output.status.success(),
        "{} locate-project exited with {}: {}",
        cargo,
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    );

    let cargo_path = Path::new(
        std::str::from_utf8(&output.stdout)
            .context("cargo locate-project returned non utf-8 path")?
            .trim(),
    );

    cargo_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .context("workspace manifest has no parent directory")
}

/// The workspace root when cargo can locate one, otherwise the current
/// directory.
fn config_dir(cargo: &str) -> anyhow::Result<PathBuf> {
    match locate_workspace(cargo) {
        Ok(dir) => Ok(dir),
        Err(e) => {
            debug!(
                task = "locate workspace",
                err = format!("{:#}", e),
                fallback = "current directory",
            );
            std::env::current_dir()
                .context("failed to read current directory")
        }
    }
}

/// Reads `config_name` from the workspace root, or from the current
/// directory outside a cargo workspace.
///
/// A missing file yields an empty table so callers fall back to their
/// defaults; a file that exists but does not parse is an error.
pub fn load_config(config_name: &str) -> anyhow::Result<Map<String, Value>> {
    let path = config_dir(env!("CARGO"))?.join(config_name);
    if !path.exists() {
        return Ok(Map::new());
    }

    parse_config(&path)
}

fn parse_config(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let config = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    toml::from_str::<Map<String, Value>>(&config)
        .with_context(|| format!("failed to parse {}", path.display()))
}
