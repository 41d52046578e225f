use std::{fs::File, path::PathBuf, sync::Arc, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum};
use learnoh::{DataProcessor, PortalConfig, PostRequest, config::DEFAULT_BASE_URL};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt as _, util::SubscriberInitExt};
use url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "learnoh",
    about = "Fetch and normalize course data from Tsinghua Web Learning.",
    version
)]
struct LearnohOptions {
    /// Portal origin every endpoint is resolved against.
    #[arg(long, env = "LEARNOH_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: Url,

    /// Session cookie header copied from a logged-in browser.
    #[arg(long, env = "LEARNOH_COOKIE", hide_env_values = true, default_value = "")]
    cookie: String,

    /// Anti-forgery token sent as `_csrf`.
    #[arg(long, env = "LEARNOH_CSRF", hide_env_values = true, default_value = "")]
    csrf: String,

    /// Upper bound on in-flight requests. Unbounded by default.
    #[arg(long, env = "LEARNOH_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "LEARNOH_TIMEOUT")]
    timeout: Option<u64>,

    /// Write the result to this file instead of stdout.
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch notices of the given courses.
    Notices(FetchArgs),
    /// Fetch assignments of the given courses, merged across status views.
    Assignments(FetchArgs),
    /// Fetch course files of the given courses.
    Files(FetchArgs),
    /// Normalize previously fetched records.
    Process {
        kind: RecordKind,
        /// JSON array of records.
        raw: PathBuf,
        /// JSON object mapping course id to `{ name, teacherName }`.
        course_names: PathBuf,
    },
    /// Send a multipart form, optionally with a file.
    Post(PostArgs),
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Course id (`wlkcid`). Repeat or separate with commas.
    #[arg(short = 'c', long = "course", value_delimiter = ',', required = true)]
    courses: Vec<String>,

    /// Normalize the result with this course name mapping.
    #[arg(long)]
    course_names: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PostArgs {
    /// Absolute URL or portal path.
    url: String,

    /// JSON object of form fields.
    #[arg(long, default_value = "{}")]
    params: String,

    #[arg(long)]
    file: Option<PathBuf>,

    #[arg(long)]
    file_name: Option<String>,

    #[arg(long)]
    file_type: Option<String>,

    /// Id attached to progress events. Progress is only logged with one.
    #[arg(long)]
    request_id: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RecordKind {
    Notices,
    Assignments,
    Files,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    setup_tracing()?;

    color_eyre::install()?;
    let options = LearnohOptions::parse();

    let config = PortalConfig::default()
        .with_base_url(options.base_url.clone())
        .with_max_concurrency(options.max_concurrency)
        .with_request_timeout(options.timeout.map(Duration::from_secs));
    let processor = DataProcessor::new(config)?.with_progress_listener(Arc::new(
        |request_id: &str, sent: u64, total: u64| {
            tracing::info!(request_id, sent, total, "Upload progress");
        },
    ));

    let output = run_reported(&processor, &options).await?;

    match &options.out {
        Some(path) => {
            tokio::fs::write(path, output).await?;
            tracing::info!("Saved result to {}", path.display());
        }
        None => println!("{output}"),
    }
    Ok(())
}

/// Runs the command, recording a failure in the error report before
/// handing it back.
async fn run_reported(
    processor: &DataProcessor,
    options: &LearnohOptions,
) -> eyre::Result<String> {
    run(processor, options)
        .await
        .inspect_err(|err| tracing::error!("{err:?}"))
}

async fn run(processor: &DataProcessor, options: &LearnohOptions) -> eyre::Result<String> {
    match &options.command {
        Command::Notices(args) => {
            require_session(options)?;
            let raw = processor
                .fetch_notices(&args.courses, &options.cookie, &options.csrf)
                .await?;
            report(RecordKind::Notices, &args.courses, &raw);
            normalize(processor, RecordKind::Notices, raw, args.course_names.as_ref()).await
        }
        Command::Assignments(args) => {
            require_session(options)?;
            let raw = processor
                .fetch_assignments(&args.courses, &options.cookie, &options.csrf)
                .await?;
            report(RecordKind::Assignments, &args.courses, &raw);
            normalize(processor, RecordKind::Assignments, raw, args.course_names.as_ref()).await
        }
        Command::Files(args) => {
            require_session(options)?;
            let raw = processor
                .fetch_files(&args.courses, &options.cookie, &options.csrf)
                .await?;
            report(RecordKind::Files, &args.courses, &raw);
            normalize(processor, RecordKind::Files, raw, args.course_names.as_ref()).await
        }
        Command::Process {
            kind,
            raw,
            course_names,
        } => {
            let raw = tokio::fs::read_to_string(raw).await?;
            normalize(processor, *kind, raw, Some(course_names)).await
        }
        Command::Post(args) => {
            require_session(options)?;
            let body = processor
                .post(PostRequest {
                    url: args.url.clone(),
                    cookie: options.cookie.clone(),
                    csrf: options.csrf.clone(),
                    params: args.params.clone(),
                    file_path: args.file.as_ref().map(|p| p.display().to_string()),
                    file_name: args.file_name.clone(),
                    file_type: args.file_type.clone(),
                    request_id: args.request_id.clone(),
                })
                .await?;
            Ok(body)
        }
    }
}

fn require_session(options: &LearnohOptions) -> eyre::Result<()> {
    if options.cookie.is_empty() || options.csrf.is_empty() {
        eyre::bail!("A session is required: pass --cookie and --csrf or set LEARNOH_COOKIE and LEARNOH_CSRF.");
    }
    Ok(())
}

async fn normalize(
    processor: &DataProcessor,
    kind: RecordKind,
    raw: String,
    course_names: Option<&PathBuf>,
) -> eyre::Result<String> {
    let Some(course_names) = course_names else {
        return Ok(raw);
    };
    let course_names = tokio::fs::read_to_string(course_names).await?;
    let processed = match kind {
        RecordKind::Notices => processor.process_notices(&raw, &course_names).await?,
        RecordKind::Assignments => processor.process_assignments(&raw, &course_names).await?,
        RecordKind::Files => processor.process_files(&raw, &course_names).await?,
    };
    Ok(processed)
}

/// Records a fetch summary in the fetch report.
fn report(kind: RecordKind, courses: &[String], raw: &str) {
    let count = serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|v| v.as_array().map(Vec::len))
        .unwrap_or_default();
    tracing::info!(
        target: "fetch_report",
        kind = ?kind,
        courses = courses.len(),
        count,
        "Fetched {count} {kind:?}"
    );
}

fn setup_tracing() -> eyre::Result<()> {
    std::fs::create_dir_all("reports").or_else(|e| {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
            Ok(())
        } else {
            Err(e)
        }
    })?;
    // stdout carries the command's output, so logs go to stderr.
    let stderr_log = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        );

    let fetch_report_file = File::create("reports/fetch_report.json")
        .map_err(|e| eyre::eyre!("Failed to create log file: {e}"))?;
    let fetch_report_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_span_list(false)
        .with_writer(Arc::new(fetch_report_file))
        .with_filter(filter::filter_fn(|metadata| {
            metadata.target() == "fetch_report"
        }));

    let error_report_file = File::create("reports/error_report.json")
        .map_err(|e| eyre::eyre!("Failed to create error log file: {e}"))?;
    let error_report_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(Arc::new(error_report_file))
        .with_filter(LevelFilter::ERROR);

    tracing_subscriber::registry()
        .with(stderr_log)
        .with(fetch_report_layer)
        .with(error_report_layer)
        .init();
    Ok(())
}
