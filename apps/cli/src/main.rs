use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use scenarist_core::{
    Attachment, BrainstormSession, CardState, CtaStrength, Direction, GeminiClient,
    GenerateError, GenerateOptions, GenerateResult, Orchestrator, Platform, QuotaService,
    Section, SectionToggles, Settings, Style, ThumbnailBoard, UploadState, Uploader,
    cache::{get_last_result_path, get_state_path, load_result, save_result},
    config::API_KEY_ENV,
    format::clamp_duration,
    orchestrator::check_brief,
    thumbnails::{ConceptId, concepts},
    types::{MAX_DURATION_SEC, MIN_DURATION_SEC},
    uploader::FileStatus,
};
use tokio::{
    fs,
    io::{AsyncBufReadExt, BufReader},
    sync::watch,
};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use uuid::Uuid;

mod output;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for Style enum (needed for clap ValueEnum)
#[derive(Clone, Copy, Default, ValueEnum)]
enum CliStyle {
    #[default]
    Storytelling,
    Provocative,
    Educational,
    Entertaining,
}

impl From<CliStyle> for Style {
    fn from(cli: CliStyle) -> Self {
        match cli {
            CliStyle::Storytelling => Style::Storytelling,
            CliStyle::Provocative => Style::Provocative,
            CliStyle::Educational => Style::Educational,
            CliStyle::Entertaining => Style::Entertaining,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum CliDirection {
    Sale,
    #[default]
    Expertise,
    Ads,
    Engagement,
}

impl From<CliDirection> for Direction {
    fn from(cli: CliDirection) -> Self {
        match cli {
            CliDirection::Sale => Direction::Sale,
            CliDirection::Expertise => Direction::Expertise,
            CliDirection::Ads => Direction::Ads,
            CliDirection::Engagement => Direction::Engagement,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum CliPlatform {
    Tiktok,
    Reels,
    Shorts,
    #[default]
    Youtube,
}

impl From<CliPlatform> for Platform {
    fn from(cli: CliPlatform) -> Self {
        match cli {
            CliPlatform::Tiktok => Platform::Tiktok,
            CliPlatform::Reels => Platform::Reels,
            CliPlatform::Shorts => Platform::Shorts,
            CliPlatform::Youtube => Platform::Youtube,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum CliCta {
    #[default]
    Soft,
    Hard,
}

impl From<CliCta> for CtaStrength {
    fn from(cli: CliCta) -> Self {
        match cli {
            CliCta::Soft => CtaStrength::Soft,
            CliCta::Hard => CtaStrength::Hard,
        }
    }
}

#[derive(Parser)]
#[command(name = "scenarist")]
#[command(about = "Turn a short brief into a short-form video script, storyboard and thumbnails")]
struct Cli {
    /// Verbose logging to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a scenario from a brief and optional reference files
    Generate(GenerateArgs),
    /// Show the last generated scenario
    Show {
        /// Sections to collapse (research, script, shots)
        #[arg(long, value_delimiter = ',')]
        collapse: Vec<Section>,
    },
    /// Render thumbnail concepts of the last scenario
    Thumbnails {
        /// 1-based concept numbers to render
        #[arg(short, long, value_delimiter = ',')]
        pick: Vec<usize>,

        /// Render every concept
        #[arg(short, long, conflicts_with = "pick")]
        all: bool,

        /// Directory for rendered images
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Also print each rendered image as a data URI
        #[arg(long)]
        data_uri: bool,
    },
    /// Chat about ideas before generating
    Brainstorm {
        /// The brief the assistant should keep in mind
        #[arg(short, long, default_value = "")]
        context: String,
    },
    /// Show today's remaining generations
    Status,
    /// Activate the PRO plan (unlimited generations)
    Subscribe,
    /// Cancel the PRO plan
    Cancel,
}

#[derive(Args)]
struct GenerateArgs {
    /// What the video is about
    #[arg(default_value = "")]
    text: String,

    /// Reference files (images, plain text, PDF)
    #[arg(short, long = "file")]
    files: Vec<PathBuf>,

    #[arg(short, long, default_value = "storytelling")]
    style: CliStyle,

    /// Goal of the video
    #[arg(short, long, default_value = "expertise")]
    direction: CliDirection,

    #[arg(short, long, default_value = "youtube")]
    platform: CliPlatform,

    /// Target duration in seconds, snapped to 15 second steps
    #[arg(
        short = 't',
        long,
        default_value_t = 180,
        value_parser = clap::value_parser!(u32).range(MIN_DURATION_SEC as i64..=MAX_DURATION_SEC as i64)
    )]
    duration: u32,

    /// Call-to-action strength
    #[arg(long, default_value = "soft")]
    cta: CliCta,

    /// Language of the generated text (e.g. "en", "de", "uk")
    #[arg(short, long, default_value = "en")]
    lang: String,

    /// Disable search grounding
    #[arg(long)]
    no_search: bool,

    /// Also save the script as markdown
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Render the first N thumbnail concepts right away
    #[arg(long, default_value_t = 0)]
    visualize: usize,

    /// Sections to collapse (research, script, shots)
    #[arg(long, value_delimiter = ',')]
    collapse: Vec<Section>,
}

impl GenerateArgs {
    /// Default options for a brief coming out of brainstorm `/apply`.
    fn from_brief(text: String) -> Self {
        Self {
            text,
            files: Vec::new(),
            style: CliStyle::default(),
            direction: CliDirection::default(),
            platform: CliPlatform::default(),
            duration: 180,
            cta: CliCta::default(),
            lang: "en".to_string(),
            no_search: false,
            export: None,
            visualize: 0,
            collapse: Vec::new(),
        }
    }
}

/// A line typed into the brainstorm prompt.
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Quit,
    Apply,
    Message(&'a str),
}

fn parse_chat_line(line: &str) -> ChatInput<'_> {
    match line.trim() {
        "/quit" => ChatInput::Quit,
        "/apply" => ChatInput::Apply,
        message => ChatInput::Message(message),
    }
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn create_upload_bar(multi: &MultiProgress, name: &str) -> ProgressBar {
    let pb = multi.add(ProgressBar::new(100));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap()
            .progress_chars("=> "),
    );
    pb.set_prefix(name.to_string());
    pb
}

fn init_tracing(verbose: bool) {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let default_level = if verbose { "scenarist=debug" } else { "scenarist=warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(false),
            )
            .with(env_filter)
            .init();
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", style("Error:").red().bold(), message);
    std::process::exit(1);
}

fn quota(settings: &Settings) -> QuotaService {
    QuotaService::with_file(get_state_path(&settings.state_dir), settings.daily_limit)
}

fn backend(settings: &Settings) -> Arc<GeminiClient> {
    match GeminiClient::from_settings(settings) {
        Ok(client) => Arc::new(client),
        Err(e) => fail(e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let settings = Settings::from_env();
    debug!(
        text_model = %settings.text_model,
        search = settings.search_grounding,
        state_dir = %settings.state_dir.display(),
        "Settings loaded"
    );

    match cli.command {
        Command::Generate(args) => generate(settings, args).await,
        Command::Show { collapse } => {
            let result = load_last_result(&settings).await?;
            output::print_result(&result, &SectionToggles::collapsed(&collapse));
            Ok(())
        }
        Command::Thumbnails {
            pick,
            all,
            out,
            data_uri,
        } => thumbnails(settings, pick, all, out, data_uri).await,
        Command::Brainstorm { context } => match brainstorm(&settings, context).await? {
            Some(brief) => generate(settings, GenerateArgs::from_brief(brief)).await,
            None => Ok(()),
        },
        Command::Status => {
            output::print_limits(&quota(&settings).status()?);
            Ok(())
        }
        Command::Subscribe => {
            let quota = quota(&settings);
            quota.subscribe()?;
            println!("{} PRO activated", style("✓").green().bold());
            output::print_limits(&quota.status()?);
            Ok(())
        }
        Command::Cancel => {
            let quota = quota(&settings);
            quota.cancel_subscription()?;
            println!("{} PRO cancelled", style("✓").green().bold());
            output::print_limits(&quota.status()?);
            Ok(())
        }
    }
}

async fn generate(mut settings: Settings, args: GenerateArgs) -> Result<()> {
    if let Err(e) = check_brief(&args.text, args.files.len()) {
        fail(e);
    }
    if args.no_search {
        settings.search_grounding = false;
    }
    let client = backend(&settings);

    println!(
        "\n{}  {}\n",
        style("scenarist").cyan().bold(),
        style("Short-form video planner").dim()
    );

    let attachments = if args.files.is_empty() {
        Vec::new()
    } else {
        upload_files(&settings, &args.files).await
    };

    let options = GenerateOptions {
        style: args.style.into(),
        direction: args.direction.into(),
        duration_sec: clamp_duration(args.duration),
        platform: args.platform.into(),
        cta_strength: args.cta.into(),
        language: args.lang,
    };
    output::print_duration_hint(options.duration_sec);

    let mut orchestrator = Orchestrator::new(client.clone(), quota(&settings));

    let start = Instant::now();
    let spinner = create_spinner(&format!("Generating scenario with {}...", settings.text_model));
    let outcome = orchestrator
        .generate(&args.text, attachments, options)
        .await
        .cloned();

    let result = match outcome {
        Ok(result) => {
            spinner.finish_with_message(format!(
                "{} Scenario generated {}",
                style("✓").green().bold(),
                style(format!("[{}]", format_duration(start.elapsed()))).dim()
            ));
            result
        }
        Err(e) => {
            spinner.finish_and_clear();
            if !orchestrator.credential_selected() {
                eprintln!(
                    "{} The key's project cannot reach {}. Set {} to a key from a project with access and try again.",
                    style("Hint:").yellow().bold(),
                    settings.text_model,
                    API_KEY_ENV
                );
            }
            if e == GenerateError::LimitExceeded {
                eprintln!(
                    "{} run `scenarist subscribe` to lift the limit",
                    style("Hint:").yellow().bold()
                );
            }
            fail(e);
        }
    };

    let last_path = get_last_result_path(&settings.cache_dir);
    save_result(&result, &last_path).await?;

    if let Some(export) = &args.export {
        fs::write(export, scenarist_core::format_result_markdown(&result))
            .await
            .with_context(|| format!("Failed to write {}", export.display()))?;
        println!(
            "{} {}",
            style("Saved:").dim(),
            style(export.display()).cyan()
        );
    }

    output::print_result(&result, &SectionToggles::collapsed(&args.collapse));

    if args.visualize > 0 && !result.thumbnail_ideas.is_empty() {
        let board = ThumbnailBoard::new(client, &result.thumbnail_ideas);
        let ids: Vec<ConceptId> = board
            .cards()
            .iter()
            .take(args.visualize)
            .map(|c| c.id)
            .collect();
        render_thumbnails(&board, &ids, &settings.cache_dir.join("thumbnails"), false).await?;
    }

    if let Ok(limits) = orchestrator.limits() {
        output::print_limits(&limits);
    }

    Ok(())
}

async fn upload_files(settings: &Settings, files: &[PathBuf]) -> Vec<Attachment> {
    let mut uploader = Uploader::new(settings.upload_policy());
    let ids = uploader.add_files(files);

    if ids.len() < files.len() {
        println!(
            "{} only {} files allowed, {} ignored",
            style("!").yellow().bold(),
            uploader.policy().max_files,
            files.len() - ids.len()
        );
    }

    let multi = MultiProgress::new();
    let bars: HashMap<Uuid, ProgressBar> = uploader
        .statuses()
        .iter()
        .map(|status| (status.id, create_upload_bar(&multi, &status.name)))
        .collect();

    let tracker = tokio::spawn(track_uploads(uploader.subscribe_statuses(), bars.clone()));
    uploader.wait().await;
    tracker.abort();

    let statuses = uploader.statuses();
    draw_uploads(&bars, &statuses);
    for bar in bars.values() {
        bar.finish();
    }

    let attachments = uploader.attachments();
    println!(
        "{} {} of {} files attached",
        style("✓").green().bold(),
        attachments.len(),
        statuses.len()
    );
    attachments
}

async fn track_uploads(
    mut statuses: watch::Receiver<Vec<FileStatus>>,
    bars: HashMap<Uuid, ProgressBar>,
) {
    while statuses.changed().await.is_ok() {
        let current = statuses.borrow_and_update().clone();
        draw_uploads(&bars, &current);
    }
}

fn draw_uploads(bars: &HashMap<Uuid, ProgressBar>, statuses: &[FileStatus]) {
    for status in statuses {
        let Some(bar) = bars.get(&status.id) else {
            continue;
        };
        bar.set_position(u64::from(status.progress));
        match &status.state {
            UploadState::Pending => bar.set_message(style("waiting").dim().to_string()),
            UploadState::Uploading => bar.set_message(style("reading").yellow().to_string()),
            UploadState::Success => bar.set_message(style("done").green().to_string()),
            UploadState::Error(message) => bar.set_message(style(message).red().to_string()),
        }
    }
}

async fn load_last_result(settings: &Settings) -> Result<GenerateResult> {
    let path = get_last_result_path(&settings.cache_dir);
    load_result(&path)
        .await
        .with_context(|| "No saved scenario yet, run `scenarist generate` first".to_string())
}

/// Resolve gallery numbers (1-based, as printed by `show`) to concept ids.
fn select_concepts(ideas: &[String], pick: &[usize], all: bool) -> Result<Vec<ConceptId>> {
    let listed = concepts(ideas);
    if all {
        return Ok(listed.into_iter().map(|(id, _)| id).collect());
    }
    pick.iter()
        .map(|n| {
            n.checked_sub(1)
                .and_then(|i| listed.get(i))
                .map(|(id, _)| *id)
                .ok_or_else(|| anyhow!("No thumbnail concept #{} (1..={})", n, listed.len()))
        })
        .collect()
}

async fn thumbnails(
    settings: Settings,
    pick: Vec<usize>,
    all: bool,
    out: Option<PathBuf>,
    data_uri: bool,
) -> Result<()> {
    let result = load_last_result(&settings).await?;
    if concepts(&result.thumbnail_ideas).is_empty() {
        println!("{}", style("The last scenario has no thumbnail concepts.").dim());
        return Ok(());
    }

    let ids = select_concepts(&result.thumbnail_ideas, &pick, all)?;
    let board = ThumbnailBoard::new(backend(&settings), &result.thumbnail_ideas);

    if ids.is_empty() {
        output::print_cards(&board.cards());
        println!(
            "\n{}",
            style("Pick concepts with --pick 1,2 or render all with --all").dim()
        );
        return Ok(());
    }

    let out = out.unwrap_or_else(|| settings.cache_dir.join("thumbnails"));
    render_thumbnails(&board, &ids, &out, data_uri).await
}

async fn render_thumbnails(
    board: &ThumbnailBoard,
    ids: &[ConceptId],
    out: &Path,
    data_uri: bool,
) -> Result<()> {
    let start = Instant::now();
    let spinner = create_spinner(&format!("Rendering {} thumbnails...", ids.len()));
    board.visualize_many(ids).await?;
    spinner.finish_with_message(format!(
        "{} Thumbnails rendered {}",
        style("✓").green().bold(),
        style(format!("[{}]", format_duration(start.elapsed()))).dim()
    ));

    output::print_cards(&board.cards());

    for id in ids {
        if let Some(CardState::Ready(image)) = board.state(*id) {
            let path = board.download(*id, out).await?;
            println!("{} {}", style("Saved:").dim(), style(path.display()).cyan());
            if data_uri {
                println!("{}", image.data_uri());
            }
        }
    }
    Ok(())
}

/// Runs the chat loop. `/apply` ends it and hands back the last reply as the next brief.
async fn brainstorm(settings: &Settings, context: String) -> Result<Option<String>> {
    let mut session = BrainstormSession::new(backend(settings), context);

    println!(
        "\n{}  {}\n",
        style("scenarist").cyan().bold(),
        style("Brainstorm (/apply generates from the last idea, /quit exits)").dim()
    );
    if let Some(greeting) = session.last_reply() {
        println!("{} {}", style("AI:").magenta().bold(), greeting);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_chat_line(&line) {
            ChatInput::Quit => break,
            // The greeting alone is not an idea.
            ChatInput::Apply if session.history().len() > 1 => {
                return Ok(session.last_reply().map(str::to_string));
            }
            ChatInput::Apply => {
                println!("{}", style("Nothing to apply yet, describe your idea first.").dim());
            }
            ChatInput::Message(message) => {
                let spinner = create_spinner("Thinking...");
                let reply = session.send(message).await;
                spinner.finish_and_clear();
                match reply {
                    Ok(Some(reply)) => println!("{} {}", style("AI:").magenta().bold(), reply),
                    Ok(None) => {}
                    Err(e) => eprintln!("{} {}", style("Error:").red().bold(), e),
                }
            }
        }
    }
    Ok(None)
}
