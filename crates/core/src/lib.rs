pub mod brainstorm;
pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod gemini;
pub mod orchestrator;
pub mod prompt;
pub mod quota;
pub mod render;
pub mod thumbnails;
pub mod types;
pub mod uploader;

pub use brainstorm::BrainstormSession;
pub use cache::{
    get_last_result_path, get_root_cache_dir, get_root_state_dir, get_state_path, load_result,
    save_result,
};
pub use config::Settings;
pub use error::{GenerateError, Result, ScenaristError};
pub use format::{extract_json, format_mmss, format_result_markdown, strip_code_fences};
pub use gemini::{GeminiClient, GenerativeBackend};
pub use orchestrator::Orchestrator;
pub use quota::QuotaService;
pub use render::{LineKind, Section, SectionToggles, classify_line};
pub use thumbnails::{CardState, ConceptId, ThumbnailBoard};
pub use types::{
    Attachment, CtaStrength, Direction, GenerateOptions, GenerateResult, ImageData, Limits,
    Platform, Style,
};
pub use uploader::{FileStatus, UploadPolicy, UploadState, Uploader};
