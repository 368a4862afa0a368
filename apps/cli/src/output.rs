//! Terminal rendering of results, limits and thumbnail cards.

use console::style;
use scenarist_core::{
    CardState, GenerateResult, LineKind, Limits, Section, SectionToggles,
    format::estimate_word_count, render::classify_script,
    thumbnails::{Card, concepts},
};

fn rule() {
    println!("{}", style("─".repeat(60)).dim());
}

fn section_header(section: Section, toggles: &SectionToggles) -> bool {
    let open = toggles.is_open(section);
    let marker = if open { "▾" } else { "▸" };
    println!(
        "\n{} {}",
        style(marker).dim(),
        style(section.title().to_uppercase()).cyan().bold()
    );
    if !open {
        println!("  {}", style("(collapsed)").dim());
    }
    open
}

pub fn print_result(result: &GenerateResult, toggles: &SectionToggles) {
    rule();

    if section_header(Section::Research, toggles) {
        if result.extracted_text.trim().is_empty() {
            println!("  {}", style("No research notes.").dim());
        } else {
            for line in result.extracted_text.trim().lines() {
                println!("  {}", line);
            }
        }
        if let Some(sources) = &result.sources {
            println!("\n  {}", style("Sources").yellow());
            for source in sources {
                println!("  • {} {}", source.title, style(&source.uri).dim().underlined());
            }
        }
    }

    if section_header(Section::Script, toggles) {
        if !result.title_options.is_empty() {
            println!("  {}", style("Titles").yellow());
            for title in &result.title_options {
                println!("  • {}", style(title).bold());
            }
        }
        if !result.hook_options.is_empty() {
            println!("\n  {}", style("Hooks").yellow());
            for (i, hook) in result.hook_options.iter().enumerate() {
                println!("  {}. {}", i + 1, hook);
            }
        }
        println!();
        for (kind, line) in classify_script(&result.script_markdown) {
            match kind {
                LineKind::Blank => println!(),
                LineKind::Header => println!("  {}", style(line).magenta().bold()),
                LineKind::Body => println!("  {}", line),
            }
        }
    }

    if section_header(Section::Shots, toggles) {
        if result.shots.is_empty() {
            println!("  {}", style("No shots.").dim());
        }
        for shot in &result.shots {
            println!("  {} {}", style(format!("[{}]", shot.t)).cyan(), shot.frame);
            if !shot.on_screen_text.is_empty() {
                println!("        {} {}", style("text").dim(), shot.on_screen_text);
            }
            if !shot.voice_over.is_empty() {
                println!("        {} {}", style("vo").dim(), style(&shot.voice_over).italic());
            }
            if !shot.broll.is_empty() {
                println!("        {} {}", style("b-roll").dim(), shot.broll);
            }
        }
    }

    let gallery = concepts(&result.thumbnail_ideas);
    if !gallery.is_empty() {
        println!("\n{}", style("THUMBNAILS").cyan().bold());
        for (i, (_, idea)) in gallery.iter().enumerate() {
            println!("  {} {}", style(format!("#{}", i + 1)).dim(), idea);
        }
    }

    if !result.hashtags.is_empty() {
        let tags = result
            .hashtags
            .iter()
            .map(|t| format!("#{}", t.trim_start_matches('#')))
            .collect::<Vec<_>>()
            .join(" ");
        println!("\n{}", style(tags).blue());
    }

    if !result.checklist.is_empty() {
        println!("\n{}", style("CHECKLIST").cyan().bold());
        for item in &result.checklist {
            println!("  {} {}", style("☐").dim(), item);
        }
    }

    rule();
}

pub fn print_limits(limits: &Limits) {
    if limits.is_pro {
        println!(
            "{} {}",
            style("PRO").yellow().bold(),
            style("unlimited generations").dim()
        );
    } else {
        println!(
            "{} {}/{} generations left today",
            style("Free plan:").dim(),
            style(limits.remaining_today).cyan().bold(),
            limits.daily_limit
        );
    }
}

pub fn print_duration_hint(duration_sec: u32) {
    println!(
        "{} {} · ~{} words",
        style("Duration:").dim(),
        scenarist_core::format_mmss(duration_sec),
        estimate_word_count(duration_sec)
    );
}

pub fn print_cards(cards: &[Card]) {
    for (i, card) in cards.iter().enumerate() {
        let state = match &card.state {
            CardState::Idle => style("idle".to_string()).dim(),
            CardState::Loading => style("rendering".to_string()).yellow(),
            CardState::Ready(image) => style(format!("ready ({})", image.mime_type)).green(),
            CardState::Failed(message) => style(format!("failed: {}", message)).red(),
        };
        println!(
            "  {} {} {}",
            style(format!("#{}", i + 1)).dim(),
            card.idea,
            state
        );
    }
}
