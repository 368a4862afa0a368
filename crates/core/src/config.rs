//! Runtime configuration read from the environment.

use std::path::PathBuf;

use crate::{
    cache::{get_root_cache_dir, get_root_state_dir},
    error::{Result, ScenaristError},
    format::clamp,
    quota::FREE_DAILY_LIMIT,
    uploader::UploadPolicy,
};

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
const LEGACY_API_KEY_ENV: &str = "API_KEY";

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_THINKING_BUDGET: u32 = 31_000;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub chat_model: String,
    pub thinking_budget: u32,
    /// Let the text model ground its research in Google Search.
    pub search_grounding: bool,
    pub daily_limit: u32,
    pub max_files: usize,
    pub max_file_bytes: u64,
    pub state_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            thinking_budget: DEFAULT_THINKING_BUDGET,
            search_grounding: true,
            daily_limit: FREE_DAILY_LIMIT,
            max_files: 3,
            max_file_bytes: 5 * MIB,
            state_dir: get_root_state_dir(),
            cache_dir: get_root_cache_dir(),
        }
    }
}

impl Settings {
    /// Load `.env` (if present) and read settings from process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let api_key = lookup(API_KEY_ENV)
            .filter(|k| is_usable_key(k))
            .or_else(|| lookup(LEGACY_API_KEY_ENV).filter(|k| is_usable_key(k)))
            .map(|k| k.trim().to_string());

        Self {
            api_key,
            api_base: lookup("SCENARIST_API_BASE")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            text_model: lookup("SCENARIST_TEXT_MODEL").unwrap_or(defaults.text_model),
            image_model: lookup("SCENARIST_IMAGE_MODEL").unwrap_or(defaults.image_model),
            chat_model: lookup("SCENARIST_CHAT_MODEL").unwrap_or(defaults.chat_model),
            thinking_budget: parsed("SCENARIST_THINKING_BUDGET")
                .map(|v| v as u32)
                .unwrap_or(defaults.thinking_budget),
            search_grounding: lookup("SCENARIST_SEARCH")
                .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "off"))
                .unwrap_or(defaults.search_grounding),
            daily_limit: parsed("SCENARIST_DAILY_LIMIT")
                .map(|v| v as u32)
                .unwrap_or(defaults.daily_limit),
            max_files: parsed("SCENARIST_MAX_FILES")
                .map(|v| clamp(v, 1, 5) as usize)
                .unwrap_or(defaults.max_files),
            max_file_bytes: parsed("SCENARIST_MAX_FILE_MB")
                .map(|v| clamp(v, 1, 10) * MIB)
                .unwrap_or(defaults.max_file_bytes),
            state_dir: lookup("SCENARIST_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_dir),
            cache_dir: lookup("SCENARIST_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
        }
    }

    /// The configured API key, or an error naming the variable to set.
    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ScenaristError::MissingApiKey {
                env_var: API_KEY_ENV.to_string(),
            })
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_files: self.max_files,
            max_bytes: self.max_file_bytes,
            ..UploadPolicy::default()
        }
    }
}

/// Deployment templates leave keys empty, `undefined`, or as a placeholder.
fn is_usable_key(key: &str) -> bool {
    let key = key.trim();
    let lower = key.to_lowercase();
    !(key.is_empty()
        || lower == "undefined"
        || lower.contains("your_api_key")
        || lower.contains("your-api-key")
        || key.starts_with('<'))
}
