use crate::{
    format::{format_mmss, target_word_count},
    types::GenerateRequest,
};

pub static SCENARIO_SYSTEM_INSTRUCTION: &str = r#"You are an elite business analyst and lead scriptwriter for short-form video.

Your mission: turn a rough request (a product, a topic, a set of reference files) into viral, expert content.

- Research the subject first: specifications, prices, reviews, audience pain points.
- Use search to check facts whenever the subject is a real product, company, or event.
- Build the script around a strong hook in the first three seconds.
- Return STRICT JSON only, with no prose before or after it."#;

static RESULT_TEMPLATE: &str = r#"{
  "extractedText": "Market and subject analysis...",
  "titleOptions": ["Title 1"],
  "hookOptions": ["Hook 1"],
  "scriptMarkdown": "Script text...",
  "shots": [{ "t": "00:00", "frame": "Frame", "onScreenText": "Text", "voiceOver": "Narrator", "broll": "SFX" }],
  "thumbnailIdeas": ["Idea 1"],
  "hashtags": ["Tag"],
  "checklist": ["Tip"]
}"#;

/// User-turn text for a scenario request. Attachments travel as separate parts.
pub fn build_scenario_prompt(request: &GenerateRequest) -> String {
    let options = &request.options;
    let subject = request.input.text.trim();
    let subject = if subject.is_empty() {
        "Analyze the attached files"
    } else {
        subject
    };

    format!(
        r#"SUBJECT: "{subject}"
PLATFORM: {platform} ({aspect})
DURATION: {duration} sec ({mmss}), about {words} spoken words
STYLE: {style} ({style_desc})
GOAL: {direction} ({direction_desc})
CALL TO ACTION: {cta}
LANGUAGE: write every text field in "{lang}"
ATTACHMENTS: {attachments}

RETURN JSON:
{template}"#,
        platform = options.platform,
        aspect = options.platform.aspect(),
        duration = options.duration_sec,
        mmss = format_mmss(options.duration_sec),
        words = target_word_count(options.duration_sec),
        style = options.style,
        style_desc = options.style.description(),
        direction = options.direction,
        direction_desc = options.direction.description(),
        cta = options.cta_strength,
        lang = options.language,
        attachments = request.input.attachments.len(),
        template = RESULT_TEMPLATE,
    )
}

pub fn build_thumbnail_prompt(idea: &str) -> String {
    format!("Cinematic commercial photography: {}", idea.trim())
}

pub fn brainstorm_system_instruction(current_input: &str) -> String {
    format!(
        r#"You are a creative assistant for video content. Help the user come up with viral video ideas.
The user's current brief: "{}".
Answer briefly and to the point, with a focus on reach and retention. Suggest concrete improvements."#,
        current_input.trim()
    )
}
