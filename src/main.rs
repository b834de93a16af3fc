use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use console::style;
use dialoguer::Confirm;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use subtrans::config::{BackendKind, Config};
use subtrans::files::{collect_subtitle_files, derive_output_path, write_output};
use subtrans::language::available_languages;
use subtrans::pipeline::{print_summary, FileReport, FileStatus, TranslationPipeline, TranslationReport};
use subtrans::subtitle::SubtitleFormat;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "subtrans")]
#[command(version, about = "Translate subtitle files with machine translation backends")]
#[command(long_about = "Translate SRT, WebVTT and ASS/SSA subtitles through a local NLLB server, a hosted inference API, Google Gemini or DeepL, keeping every timestamp and index intact.")]
struct Cli {
    /// Subtitle file or directory of subtitle files
    #[arg(required_unless_present_any = ["list_languages", "save_config"])]
    input: Option<PathBuf>,

    /// Output file, or output directory when translating several files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Replace existing output files without asking
    #[arg(long)]
    overwrite: bool,

    /// Source language code or name, or "auto" to detect
    #[arg(short = 's', long = "source-lang")]
    source_lang: Option<String>,

    /// Target language code or name (e.g. nld_Latn, fr, German)
    #[arg(short = 't', long = "target-lang")]
    target_lang: Option<String>,

    /// Translation backend: local_nllb, huggingface, gemini, deepl
    #[arg(short, long)]
    backend: Option<String>,

    /// Override the backend endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// API key for the selected backend
    #[arg(long)]
    api_key: Option<String>,

    /// Model name for backends that support one
    #[arg(long)]
    model: Option<String>,

    /// Segments per request
    #[arg(long)]
    batch_size: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Retries for timed-out or malformed responses
    #[arg(long)]
    max_retries: Option<u32>,

    /// Seconds between retries
    #[arg(long)]
    retry_delay: Option<u64>,

    /// Desired tone, e.g. casual or formal
    #[arg(long)]
    tone: Option<String>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors, no progress or summary
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// List supported languages and exit
    #[arg(long)]
    list_languages: bool,

    /// Read settings from this file instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Save the effective settings to the config file
    #[arg(long)]
    save_config: bool,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn print_languages() {
    println!("{}", style("Supported languages").bold());
    for info in available_languages() {
        println!(
            "  {:<8} {:<10} {}",
            style(info.tag).cyan(),
            info.code,
            info.name
        );
    }
}

/// Fold command-line flags over the loaded settings.
fn apply_overrides(cli: &Cli, config: &mut Config) -> Result<()> {
    if let Some(backend) = &cli.backend {
        config.backend = backend
            .parse::<BackendKind>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = Some(endpoint.clone());
    }
    if let Some(key) = &cli.api_key {
        config.set_api_key(config.backend, key.clone());
    }
    if let Some(model) = &cli.model {
        config.model = Some(model.clone());
    }
    if let Some(size) = cli.batch_size {
        config.batch_size = size;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(retries) = cli.max_retries {
        config.max_retries = retries;
    }
    if let Some(delay) = cli.retry_delay {
        config.retry_delay_secs = delay;
    }
    if let Some(source) = &cli.source_lang {
        config.source_language = source.clone();
    }
    if let Some(target) = &cli.target_lang {
        config.target_language = target.clone();
    }
    if let Some(tone) = &cli.tone {
        config.tone = Some(tone.clone());
    }
    Ok(())
}

/// Ask before replacing a file. Unattended runs never overwrite.
fn confirm_overwrite(path: &Path) -> bool {
    if !console::user_attended() {
        return false;
    }
    Confirm::new()
        .with_prompt(format!("{} exists. Overwrite?", path.display()))
        .default(false)
        .interact()
        .unwrap_or(false)
}

async fn translate_one(
    pipeline: &TranslationPipeline,
    input: &Path,
    output: &Path,
) -> Result<TranslationReport> {
    let format = SubtitleFormat::from_path(input)?;
    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    let result = pipeline
        .translate_file(&bytes, format)
        .await
        .with_context(|| format!("Failed to translate {}", input.display()))?;

    write_output(output, &result.output())
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Wrote {}", output.display());

    Ok(result.report)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    if cli.list_languages {
        print_languages();
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = if path.exists() {
                Config::load_from(path).with_context(|| {
                    format!("Failed to load configuration from {}", path.display())
                })?
            } else {
                Config::default()
            };
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => Config::load().context("Failed to load configuration")?,
    };
    apply_overrides(&cli, &mut config)?;

    if cli.save_config {
        let path = match &cli.config {
            Some(path) => {
                config.save_to(path)?;
                path.clone()
            }
            None => config.save()?,
        };
        println!("{} Settings saved to {}", style("✓").green(), path.display());
    }

    let Some(input) = cli.input.clone() else {
        return Ok(());
    };

    let translation_config = config
        .translation_config()
        .context("Configuration validation failed")?;

    let files = collect_subtitle_files(&input, cli.recursive)?;
    if files.is_empty() {
        warn!("No subtitle files found in {}", input.display());
        return Ok(());
    }

    info!("Input:    {}", input.display());
    info!("Files:    {}", files.len());
    info!("Backend:  {}", translation_config.backend);
    info!("Source:   {}", translation_config.source_language);
    info!("Target:   {}", translation_config.target_language);

    let target = translation_config.target_language.to_string();
    let input_root = if input.is_dir() {
        input.clone()
    } else {
        input.parent().map(Path::to_path_buf).unwrap_or_default()
    };
    let explicit_output = match &cli.output {
        Some(path) if input.is_file() && !path.is_dir() => Some(path.clone()),
        _ => None,
    };
    let output_dir = cli.output.clone().filter(|_| explicit_output.is_none());

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupted, finishing the current request");
            cancelled.store(true, Ordering::SeqCst);
        })
        .context("Failed to install Ctrl-C handler")?;
    }

    let pipeline = TranslationPipeline::new(translation_config)
        .context("Failed to initialise translation backend")?
        .with_progress(!cli.quiet)
        .with_cancellation(cancelled.clone());
    debug!("Backend {} ready", pipeline.backend().name());

    let start_time = Instant::now();
    let mut reports = Vec::with_capacity(files.len());

    for file in &files {
        if cancelled.load(Ordering::SeqCst) {
            reports.push(FileReport {
                input: file.clone(),
                output: None,
                status: FileStatus::Skipped("cancelled".to_string()),
            });
            continue;
        }

        let output = explicit_output.clone().unwrap_or_else(|| {
            derive_output_path(file, &input_root, output_dir.as_deref(), &target)
        });

        if output.exists() && !cli.overwrite && !confirm_overwrite(&output) {
            debug!("Skipping {}, {} exists", file.display(), output.display());
            reports.push(FileReport {
                input: file.clone(),
                output: Some(output),
                status: FileStatus::Skipped("output exists (use --overwrite)".to_string()),
            });
            continue;
        }

        let status = match translate_one(&pipeline, file, &output).await {
            Ok(report) => FileStatus::Translated(report),
            Err(e) => {
                warn!("{:#}", e);
                FileStatus::Failed(format!("{:#}", e))
            }
        };
        reports.push(FileReport {
            input: file.clone(),
            output: Some(output),
            status,
        });
    }

    pipeline.close().await;

    if !cli.quiet {
        print_summary(&reports, start_time.elapsed());
    }

    let failed = reports
        .iter()
        .filter(|r| matches!(r.status, FileStatus::Failed(_)))
        .count();
    if failed > 0 {
        anyhow::bail!("{} of {} files failed", failed, reports.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overrides_apply_over_config() {
        let cli = Cli::parse_from([
            "subtrans",
            "movie.srt",
            "-b",
            "deepl",
            "--api-key",
            "secret",
            "-t",
            "German",
            "--batch-size",
            "10",
        ]);
        let mut config = Config::default();
        apply_overrides(&cli, &mut config).unwrap();

        assert_eq!(config.backend, BackendKind::CommercialMt);
        assert_eq!(config.deepl_api_key.as_deref(), Some("secret"));
        assert_eq!(config.target_language, "German");
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.source_language, "auto");
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let cli = Cli::parse_from(["subtrans", "movie.srt", "-b", "babelfish"]);
        assert!(apply_overrides(&cli, &mut Config::default()).is_err());
    }

    #[test]
    fn test_input_required_for_translation() {
        assert!(Cli::try_parse_from(["subtrans", "-t", "fr"]).is_err());
    }

    #[test]
    fn test_list_languages_needs_no_input() {
        let cli = Cli::parse_from(["subtrans", "--list-languages"]);
        assert!(cli.input.is_none());
        assert!(cli.list_languages);
    }
}
