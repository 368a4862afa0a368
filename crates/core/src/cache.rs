use std::path::{Path, PathBuf};

use tokio::fs;

use crate::{error::Result, types::GenerateResult};

pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("scenarist")
}

/// Directory for the persisted quota state.
pub fn get_root_state_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("scenarist")
}

/// Get the path for the key-value state file
pub fn get_state_path(state_dir: &Path) -> PathBuf {
    state_dir.join("state.json")
}

/// Get the path for the most recent generation result
pub fn get_last_result_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("last_result.json")
}

/// Load a result from a cached file
pub async fn load_result(path: &Path) -> Result<GenerateResult> {
    let json_content = fs::read_to_string(path).await?;
    let result: GenerateResult = serde_json::from_str(&json_content)?;
    Ok(result)
}

/// Save a result to a file, creating parent directories as needed
pub async fn save_result(result: &GenerateResult, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let pretty_json = serde_json::to_string_pretty(result)?;
    fs::write(path, &pretty_json).await?;
    Ok(())
}
