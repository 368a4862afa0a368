use crate::types::{
    DURATION_STEP_SEC, GenerateResult, MAX_DURATION_SEC, MIN_DURATION_SEC,
};

/// Spoken words per minute assumed when sizing a script.
const WORDS_PER_MINUTE: u32 = 140;

/// Format seconds as MM:SS timestamp
pub fn format_mmss(total_sec: u32) -> String {
    format!("{:02}:{:02}", total_sec / 60, total_sec % 60)
}

pub fn clamp<T: PartialOrd>(n: T, min: T, max: T) -> T {
    if n < min {
        min
    } else if n > max {
        max
    } else {
        n
    }
}

/// Snap a duration onto the slider: inside 15..=600 and on a 15 second step.
pub fn clamp_duration(duration_sec: u32) -> u32 {
    let clamped = clamp(duration_sec, MIN_DURATION_SEC, MAX_DURATION_SEC);
    let snapped = (clamped + DURATION_STEP_SEC / 2) / DURATION_STEP_SEC * DURATION_STEP_SEC;
    clamp(snapped, MIN_DURATION_SEC, MAX_DURATION_SEC)
}

/// Word count the script should aim for at a normal speaking pace.
pub fn target_word_count(duration_sec: u32) -> u32 {
    duration_sec * WORDS_PER_MINUTE / 60
}

/// Rough word estimate shown next to the duration.
pub fn estimate_word_count(duration_sec: u32) -> u32 {
    duration_sec * 23 / 10
}

/// Remove a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(s: &str) -> &str {
    let t = s.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };

    let lang_len = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    let rest = &rest[lang_len..];
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Slice from the first `{` to the last `}` inclusive. Models sometimes wrap the
/// JSON object in prose; without a usable pair the input comes back unchanged.
pub fn extract_json(s: &str) -> &str {
    match (s.find('{'), s.rfind('}')) {
        (Some(first), Some(last)) if last > first => &s[first..=last],
        _ => s,
    }
}

/// Render a result as a markdown document, used when saving the script to disk.
pub fn format_result_markdown(result: &GenerateResult) -> String {
    let mut output = String::new();

    if let Some(title) = result.title_options.first() {
        output.push_str(&format!("# {}\n\n", title));
    }

    if result.title_options.len() > 1 {
        output.push_str("## Title options\n\n");
        for title in &result.title_options {
            output.push_str(&format!("• {}\n", title));
        }
        output.push('\n');
    }

    if !result.hook_options.is_empty() {
        output.push_str("## Hooks\n\n");
        for (i, hook) in result.hook_options.iter().enumerate() {
            output.push_str(&format!("{}. {}\n", i + 1, hook));
        }
        output.push('\n');
    }

    if !result.extracted_text.is_empty() {
        output.push_str("## Research\n\n");
        output.push_str(result.extracted_text.trim());
        output.push_str("\n\n");
    }

    if let Some(sources) = &result.sources {
        output.push_str("### Sources\n\n");
        for source in sources {
            output.push_str(&format!("- [{}]({})\n", source.title, source.uri));
        }
        output.push('\n');
    }

    output.push_str("## Script\n\n");
    output.push_str(result.script_markdown.trim());
    output.push_str("\n\n");

    if !result.shots.is_empty() {
        output.push_str("## Storyboard\n\n");
        output.push_str("| Time | Frame | On-screen text | Voice-over | B-roll |\n");
        output.push_str("|---|---|---|---|---|\n");
        for shot in &result.shots {
            output.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                table_cell(&shot.t),
                table_cell(&shot.frame),
                table_cell(&shot.on_screen_text),
                table_cell(&shot.voice_over),
                table_cell(&shot.broll)
            ));
        }
        output.push('\n');
    }

    if !result.thumbnail_ideas.is_empty() {
        output.push_str("## Thumbnail ideas\n\n");
        for idea in &result.thumbnail_ideas {
            output.push_str(&format!("• {}\n", idea));
        }
        output.push('\n');
    }

    if !result.hashtags.is_empty() {
        let tags = result
            .hashtags
            .iter()
            .map(|tag| format!("#{}", tag.trim_start_matches('#')))
            .collect::<Vec<_>>()
            .join(" ");
        output.push_str("## Hashtags\n\n");
        output.push_str(&tags);
        output.push_str("\n\n");
    }

    if !result.checklist.is_empty() {
        output.push_str("## Checklist\n\n");
        for item in &result.checklist {
            output.push_str(&format!("- [ ] {}\n", item));
        }
    }

    output
}

fn table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}
