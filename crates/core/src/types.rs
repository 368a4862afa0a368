use std::fmt;

use serde::{Deserialize, Serialize};

/// Shortest and longest video the duration slider allows, in seconds.
pub const MIN_DURATION_SEC: u32 = 15;
pub const MAX_DURATION_SEC: u32 = 600;
pub const DURATION_STEP_SEC: u32 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub data_base64: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Storytelling,
    Provocative,
    Educational,
    Entertaining,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sale,
    #[default]
    Expertise,
    Ads,
    Engagement,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Tiktok,
    Reels,
    Shorts,
    #[default]
    Youtube,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CtaStrength {
    #[default]
    Soft,
    Hard,
}

impl Style {
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Storytelling => "storytelling",
            Style::Provocative => "provocative",
            Style::Educational => "educational",
            Style::Entertaining => "entertaining",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Style::Storytelling => "a story with a hero's arc",
            Style::Provocative => "bold and hype-driven",
            Style::Educational => "useful facts and takeaways",
            Style::Entertaining => "humor and fast pacing",
        }
    }
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Sale => "sale",
            Direction::Expertise => "expertise",
            Direction::Ads => "ads",
            Direction::Engagement => "engagement",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Direction::Sale => "focus on the offer",
            Direction::Expertise => "build a personal brand",
            Direction::Ads => "native advertising",
            Direction::Engagement => "shares and comments",
        }
    }
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Tiktok => "tiktok",
            Platform::Reels => "reels",
            Platform::Shorts => "shorts",
            Platform::Youtube => "youtube",
        }
    }

    /// Frame orientation the platform expects.
    pub fn aspect(&self) -> &'static str {
        match self {
            Platform::Youtube => "horizontal 16:9",
            Platform::Tiktok | Platform::Reels | Platform::Shorts => "vertical 9:16",
        }
    }
}

impl CtaStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            CtaStrength::Soft => "soft",
            CtaStrength::Hard => "hard",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(Style, Direction, Platform, CtaStrength);

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOptions {
    pub style: Style,
    pub direction: Direction,
    pub duration_sec: u32,
    pub platform: Platform,
    pub cta_strength: CtaStrength,
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            style: Style::default(),
            direction: Direction::default(),
            duration_sec: 180,
            platform: Platform::default(),
            cta_strength: CtaStrength::default(),
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateInput {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub input: GenerateInput,
    pub options: GenerateOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Shot {
    pub t: String,
    pub frame: String,
    pub on_screen_text: String,
    pub voice_over: String,
    pub broll: String,
}

/// Parsed reply of the text endpoint. Fields the model left out decode as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateResult {
    pub extracted_text: String,
    pub title_options: Vec<String>,
    pub hook_options: Vec<String>,
    pub script_markdown: String,
    pub shots: Vec<Shot>,
    pub thumbnail_ideas: Vec<String>,
    pub hashtags: Vec<String>,
    pub checklist: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<GroundingSource>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    pub is_pro: bool,
    pub daily_limit: u32,
    pub used_today: u32,
    pub remaining_today: u32,
}

/// An image returned by the image endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    pub mime_type: String,
    pub data_base64: String,
}

impl ImageData {
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data_base64)
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}
