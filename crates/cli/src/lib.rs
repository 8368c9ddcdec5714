use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use doc_model::{AnnotationStyle, HighlightSettings, PageLayout, Strength, Suggestions};
use highlighter::{highlight_with, CancellationToken};
use pdf_engine::{default_engine, extract_text, LayoutOptions, OpenSource, PdfEngine};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::Storage;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "quotemark")]
#[command(about = "Find quotes in a PDF and highlight them")]
pub struct Cli {
    /// Raise log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Annotate every occurrence of the given quotes and print the report.
    Highlight {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Quote to highlight (repeatable)
        #[arg(long = "quote", value_name = "TEXT")]
        quotes: Vec<String>,
        /// File with one quote per line
        #[arg(long, value_name = "PATH")]
        quotes_file: Option<PathBuf>,
        /// Suggester output (JSON) to take quotes from
        #[arg(long, value_name = "PATH")]
        suggestions: Option<PathBuf>,
        /// Only use suggestions for this criterion id (repeatable)
        #[arg(long = "criterion", value_name = "ID", requires = "suggestions")]
        criteria: Vec<String>,
        /// Skip suggestions weaker than this
        #[arg(long, value_enum, default_value_t = StrengthArg::Low)]
        min_strength: StrengthArg,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum)]
        style: Option<StyleArg>,
        /// Settings file instead of the per-user settings
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Print the plain text of a PDF.
    Extract {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        max_chars: Option<usize>,
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Print the extracted text spans as JSON.
    Spans {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// 1-based page number; all pages when omitted
        #[arg(long)]
        page: Option<u32>,
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Print the effective settings as JSON.
    Settings {
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Store the effective settings as the per-user defaults
        #[arg(long)]
        save: bool,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrengthArg {
    Low,
    Medium,
    High,
}

impl From<StrengthArg> for Strength {
    fn from(value: StrengthArg) -> Self {
        match value {
            StrengthArg::Low => Strength::Low,
            StrengthArg::Medium => Strength::Medium,
            StrengthArg::High => Strength::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StyleArg {
    Highlight,
    Box,
}

impl From<StyleArg> for AnnotationStyle {
    fn from(value: StyleArg) -> Self {
        match value {
            StyleArg::Highlight => AnnotationStyle::Highlight,
            StyleArg::Box => AnnotationStyle::Box,
        }
    }
}

#[derive(Debug, Serialize)]
struct SpansOutput {
    path: String,
    pages: Vec<PageLayout>,
}

struct HighlightArgs {
    file: PathBuf,
    quotes: Vec<String>,
    quotes_file: Option<PathBuf>,
    suggestions: Option<PathBuf>,
    criteria: Vec<String>,
    min_strength: Strength,
    output: Option<PathBuf>,
    style: Option<AnnotationStyle>,
    config: Option<PathBuf>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Highlight {
            file,
            quotes,
            quotes_file,
            suggestions,
            criteria,
            min_strength,
            output,
            style,
            config,
        } => run_highlight(HighlightArgs {
            file,
            quotes,
            quotes_file,
            suggestions,
            criteria,
            min_strength: min_strength.into(),
            output,
            style: style.map(Into::into),
            config,
        }),
        Commands::Extract { file, max_chars, config } => {
            run_extract(&file, max_chars, config.as_deref())
        }
        Commands::Spans { file, page, config } => run_spans(&file, page, config.as_deref()),
        Commands::Settings { config, save } => run_settings(config.as_deref(), save),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second initialisation (tests calling `run` twice) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_highlight(args: HighlightArgs) -> Result<()> {
    ensure_pdf_exists(&args.file)?;

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(style) = args.style {
        settings.style = style;
    }

    let quotes = collect_quotes(&args)?;
    if quotes.is_empty() {
        tracing::warn!("no quotes supplied, the document will be copied without annotations");
    }

    let bytes = fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let result = highlight_with(&bytes, &quotes, &settings, &CancellationToken::new())
        .map_err(|err| {
            let context = if err.is_parse_error() {
                format!("failed to read {} as a PDF", args.file.display())
            } else {
                "failed to highlight PDF".to_owned()
            };
            anyhow::Error::new(err).context(context)
        })?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_highlight_output(&args.file, &args.criteria));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, &result.document)
        .with_context(|| format!("failed to write PDF to {}", output.display()))?;

    tracing::info!(
        output = %output.display(),
        total_hits = result.report.total_hits(),
        drawn_regions = result.drawn_regions,
        "wrote highlighted PDF"
    );
    for quote in result.report.zero_hit_quotes() {
        tracing::info!(quote, "quote not found");
    }

    let json = serde_json::to_string_pretty(&result.report)?;
    println!("{json}");

    Ok(())
}

fn collect_quotes(args: &HighlightArgs) -> Result<Vec<String>> {
    let mut quotes = args.quotes.clone();

    if let Some(path) = &args.quotes_file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read quotes from {}", path.display()))?;
        quotes.extend(
            text.lines().map(str::trim).filter(|line| !line.is_empty()).map(str::to_owned),
        );
    }

    if let Some(path) = &args.suggestions {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read suggestions from {}", path.display()))?;
        let suggestions = Suggestions::from_json(&bytes)
            .with_context(|| format!("failed to parse suggestions in {}", path.display()))?;
        let criteria = (!args.criteria.is_empty()).then_some(args.criteria.as_slice());
        quotes.extend(suggestions.quotes(criteria, args.min_strength));
    }

    Ok(quotes)
}

fn run_extract(file: &Path, max_chars: Option<usize>, config: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    let settings = load_settings(config)?;
    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let text = extract_text(&bytes, max_chars.unwrap_or(settings.max_text_chars))
        .context("failed to open PDF")?;

    println!("{text}");
    Ok(())
}

fn run_spans(file: &Path, page: Option<u32>, config: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == Some(0) {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let settings = load_settings(config)?;
    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let options = LayoutOptions::from(&settings);
    let pages = match page {
        Some(page) => {
            let page_count = engine.page_count(handle)?;
            if page > page_count {
                anyhow::bail!("page {page} out of range (page_count={page_count})");
            }
            let sources = engine.page_sources(handle)?;
            sources
                .get(page as usize - 1)
                .map(|source| vec![source.extract(&options)])
                .unwrap_or_default()
        }
        None => engine.extract_layouts(handle, &options)?,
    };

    let payload = SpansOutput { path: file.display().to_string(), pages };
    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_settings(config: Option<&Path>, save: bool) -> Result<()> {
    let settings = load_settings(config)?;

    if save {
        let store = Storage::from_default_project()?;
        store
            .save_settings(&settings)
            .with_context(|| format!("failed to save settings to {}", store.root().display()))?;
        tracing::info!(path = %store.settings_path().display(), "saved settings");
    }

    let json = serde_json::to_string_pretty(&settings)?;
    println!("{json}");
    Ok(())
}

fn load_settings(config: Option<&Path>) -> Result<HighlightSettings> {
    match config {
        Some(path) => storage::load_settings_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => {
            let store = Storage::from_default_project()?;
            store
                .load_settings()
                .with_context(|| format!("failed to load settings from {}", store.root().display()))
        }
    }
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_highlight_output(file: &Path, criteria: &[String]) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("document");

    match criteria {
        [criterion] => file.with_file_name(format!("{stem}_criterion-{criterion}_highlighted.pdf")),
        _ => file.with_file_name(format!("{stem}_highlighted.pdf")),
    }
}
