use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};

use slidedex_core::cli::{Cli, Commands};
use slidedex_core::config::CONFIG_FILE_NAME;
use slidedex_core::logger::{BuildLog, Logger};
use slidedex_core::parser::{console_filter, LogComponent, LogLevel};
use slidedex_core::{
    BuildError, BuildOrchestrator, BuildService, BuildSettings, Config, Document, EntityId,
};

const NEW_HEADER: &str = "\\documentclass{beamer}\n\\begin{document}";
const NEW_FOOTER: &str = "\\end{document}";

#[derive(Debug, Serialize)]
struct SlideStatus {
    index: usize,
    basename: Option<String>,
    needs_compile: bool,
    artifact: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct DocumentStatus {
    path: PathBuf,
    modified: bool,
    needs_compile: bool,
    artifact: Option<PathBuf>,
    slides: Vec<SlideStatus>,
}

fn init_config(cli: &Cli) -> Result<()> {
    let config_path = cli.working_directory().join(CONFIG_FILE_NAME);

    if config_path.exists() {
        anyhow::bail!(
            "{} already exists at {}. Remove it first if you want to reinitialize.",
            CONFIG_FILE_NAME,
            config_path.display()
        );
    }

    Config::default()
        .save_to_file(&config_path)
        .with_context(|| format!("Failed to save {}", CONFIG_FILE_NAME))?;

    println!("Created {} at {}", CONFIG_FILE_NAME, config_path.display());
    Ok(())
}

fn list_skeletons(cli: &Cli) -> Result<()> {
    let anchor = cli.working_directory().join(CONFIG_FILE_NAME);
    let config = Config::load_for_document(&anchor, cli.config.as_deref())?;

    println!("Available skeletons:");
    for (name, body) in config.skeletons() {
        let lines = body.lines().count();
        println!("  - {} ({} lines)", name, lines);
    }
    Ok(())
}

fn skeleton_body(config: &Config, name: &str) -> Result<String> {
    config
        .skeleton(name)
        .with_context(|| format!("Unknown skeleton '{}'", name))
}

fn slide_index(number: usize) -> Result<usize> {
    number
        .checked_sub(1)
        .context("Slide numbers start at 1")
}

fn load(path: &Path) -> Result<Document> {
    Document::load(path)
        .with_context(|| format!("Failed to open {}", path.display()))
}

fn new_document(path: &Path, config: &Config, slides: usize, skeleton: &str) -> Result<i32> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }

    let body = skeleton_body(config, skeleton)?;
    let mut document = Document::new(NEW_HEADER.to_string(), NEW_FOOTER.to_string());
    for _ in 0..slides {
        document.append_slide(body.clone());
    }
    document
        .save_as(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Created {} with {} slide(s)", path.display(), slides);
    Ok(0)
}

async fn compile(
    orchestrator: &BuildOrchestrator,
    log: &BuildLog,
    path: &Path,
    slide: Option<usize>,
) -> Result<i32> {
    let mut document = load(path)?;

    if let Some(number) = slide {
        let id = EntityId::Slide(document.slide_at(slide_index(number)?)?);
        if orchestrator.check_cached(&mut document, id)? {
            return Ok(0);
        }

        let unnamed = document.entity(id)?.basename().is_none();
        let result = orchestrator
            .compile(&mut document, id, orchestrator.settings().stop_on_error)
            .await;
        if unnamed {
            document.save().context("Failed to record slide basename")?;
        }

        return match result {
            Ok(()) => Ok(0),
            Err(BuildError::StageFailure { status }) => {
                acknowledge_halt(orchestrator, log).await?;
                log.error(
                    LogComponent::Orchestrator,
                    format!("slide {} failed with status {}", number, status),
                );
                Ok(1)
            }
            Err(err) => Err(err.into()),
        };
    }

    for id in document.slide_ids() {
        orchestrator.check_cached(&mut document, EntityId::Slide(id))?;
    }
    let document_fresh = orchestrator.check_cached(&mut document, EntityId::Document)?;
    let slides_fresh = document
        .slides()
        .iter()
        .all(|slide| !slide.entity().needs_compile());

    if document_fresh && slides_fresh {
        log.info(LogComponent::Orchestrator, "everything is up to date");
        return Ok(0);
    }

    let report = orchestrator.compile_document(&mut document).await?;

    for (id, err) in report.failures() {
        let position = match id {
            EntityId::Slide(slide) => document
                .slides()
                .position(slide)
                .map(|index| format!("slide {}", index + 1))
                .unwrap_or_else(|| id.to_string()),
            _ => id.to_string(),
        };
        log.error(LogComponent::Orchestrator, format!("{}: {}", position, err));
    }

    if report.is_success() {
        log.info(LogComponent::Orchestrator, "build finished");
        Ok(0)
    } else {
        acknowledge_halt(orchestrator, log).await?;
        Ok(1)
    }
}

async fn acknowledge_halt(orchestrator: &BuildOrchestrator, log: &BuildLog) -> Result<()> {
    let snapshot = orchestrator.queue().snapshot().await?;
    if snapshot.state == slidedex_core::QueueState::Halted {
        let dropped = orchestrator.queue().acknowledge().await?;
        log.warn(
            LogComponent::Queue,
            format!("queue halted after a failure; acknowledged ({} queued job(s) dropped)", dropped),
        );
    }
    Ok(())
}

fn status(
    orchestrator: &BuildOrchestrator,
    path: &Path,
    json: bool,
) -> Result<i32> {
    let mut document = load(path)?;

    for id in document.slide_ids() {
        orchestrator.check_cached(&mut document, EntityId::Slide(id))?;
    }
    orchestrator.check_cached(&mut document, EntityId::Document)?;

    let slides = document
        .slides()
        .iter()
        .enumerate()
        .map(|(index, slide)| SlideStatus {
            index: index + 1,
            basename: slide.entity().basename().map(str::to_string),
            needs_compile: slide.entity().needs_compile(),
            artifact: slide.entity().artifact().map(|a| a.path().to_path_buf()),
        })
        .collect();

    let status = DocumentStatus {
        path: path.to_path_buf(),
        modified: document.is_modified(),
        needs_compile: document.root().needs_compile(),
        artifact: document.root().artifact().map(|a| a.path().to_path_buf()),
        slides,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).context("Failed to serialize status")?
        );
        return Ok(0);
    }

    println!("{}", status.path.display());
    println!(
        "  document: {}",
        if status.needs_compile { "stale" } else { "up to date" }
    );
    for slide in &status.slides {
        let state = if slide.needs_compile { "stale" } else { "up to date" };
        let name = slide.basename.as_deref().unwrap_or("-");
        println!("  {:>3}  {:<16} {}", slide.index, name, state);
    }
    Ok(0)
}

fn add_slide(
    path: &Path,
    config: &Config,
    after: Option<usize>,
    skeleton: &str,
) -> Result<i32> {
    let mut document = load(path)?;
    let body = skeleton_body(config, skeleton)?;
    let index = after.unwrap_or(document.slides().len());

    document.insert_slide(index, body)?;
    document.save()?;

    println!("Inserted slide {}", index + 1);
    Ok(0)
}

fn delete_slide(
    orchestrator: &BuildOrchestrator,
    path: &Path,
    number: usize,
) -> Result<i32> {
    let mut document = load(path)?;
    orchestrator.delete_slide(&mut document, slide_index(number)?)?;
    document.save()?;

    println!("Deleted slide {}", number);
    Ok(0)
}

fn move_slide(path: &Path, from: usize, to: usize, count: usize) -> Result<i32> {
    let mut document = load(path)?;
    document.move_slides(slide_index(from)?, count, slide_index(to)?)?;
    document.save()?;

    println!("Moved {} slide(s) from {} to {}", count, from, to);
    Ok(0)
}

fn clean(orchestrator: &BuildOrchestrator, path: &Path) -> Result<i32> {
    let document = load(path)?;
    let removed = orchestrator.clean(&document)?;

    println!("Removed {} build file(s)", removed);
    Ok(0)
}

async fn run_command(
    cli: &Cli,
    config: &Config,
    orchestrator: &BuildOrchestrator,
    log: &BuildLog,
    path: &Path,
) -> Result<i32> {
    match &cli.command {
        Commands::New {
            slides, skeleton, ..
        } => new_document(path, config, *slides, skeleton),
        Commands::Compile { slide, .. } => compile(orchestrator, log, path, *slide).await,
        Commands::Status { json, .. } => status(orchestrator, path, *json),
        Commands::AddSlide {
            after, skeleton, ..
        } => add_slide(path, config, *after, skeleton),
        Commands::DeleteSlide { index, .. } => delete_slide(orchestrator, path, *index),
        Commands::MoveSlide {
            from, to, count, ..
        } => move_slide(path, *from, *to, *count),
        Commands::Clean { .. } => clean(orchestrator, path),
        Commands::Init | Commands::Skeletons => Ok(0),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(file) = cli.command.file() else {
        return match cli.command {
            Commands::Init => init_config(&cli),
            _ => list_skeletons(&cli),
        };
    };

    let path = cli.resolve(file);
    let config = Config::load_for_document(&path, cli.config.as_deref())?;

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        config.logs.level()
    };
    let logger = Logger::new()
        .with_timestamps(config.logs.show_timestamps)
        .with_filter(Box::new(console_filter(level)));
    let (log, log_rx) = BuildLog::channel();
    let printer = tokio::spawn(async move { logger.drain(log_rx).await });

    let mut settings = BuildSettings::from_config(&config).context("Invalid build command")?;
    if let Commands::Compile { keep_going: true, .. } = cli.command {
        settings.stop_on_error = false;
    }

    let (queue, service) = BuildService::spawn(log.clone());
    let orchestrator = BuildOrchestrator::new(queue, settings, log.clone());

    let outcome = run_command(&cli, &config, &orchestrator, &log, &path).await;

    drop(orchestrator);
    drop(log);
    let _ = service.await;
    let _ = printer.await;

    let code = outcome?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
