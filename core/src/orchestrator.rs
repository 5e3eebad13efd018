use std::path::{Path, PathBuf};

use crate::cache::{self, Artifact, CacheStatus};
use crate::command::CommandTemplate;
use crate::config::Config;
use crate::document::{Document, EntityId, Slide};
use crate::error::{BuildError, BuildResult};
use crate::logger::BuildLog;
use crate::parser::LogComponent;
use crate::queue::{Job, JobHandle};
use crate::service::QueueHandle;

const BY_PRODUCT_EXTENSIONS: &[&str] = &["aux", "log", "dvi", "ps", "out", "nav", "snm", "toc"];

#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub slide_template: CommandTemplate,
    pub presentation_template: CommandTemplate,
    pub stop_on_error: bool,
    pub source_extension: String,
    pub artifact_extension: String,
    pub basename_prefix: String,
}

impl BuildSettings {
    pub fn from_config(config: &Config) -> BuildResult<Self> {
        Ok(Self {
            slide_template: config.commands.slide_template()?,
            presentation_template: config.commands.presentation_template()?,
            stop_on_error: config.build.stop_on_error,
            source_extension: config.build.source_extension.clone(),
            artifact_extension: config.build.artifact_extension.clone(),
            basename_prefix: config.build.basename_prefix.clone(),
        })
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            slide_template: CommandTemplate::default(),
            presentation_template: CommandTemplate::default(),
            stop_on_error: true,
            source_extension: "tex".to_string(),
            artifact_extension: "pdf".to_string(),
            basename_prefix: "ztmp".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityPaths {
    pub stem: PathBuf,
    pub source: PathBuf,
    pub artifact: PathBuf,
}

#[derive(Debug)]
pub struct PendingCompile {
    entity: EntityId,
    revision: u64,
    artifact: PathBuf,
    handle: JobHandle,
}

impl PendingCompile {
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact
    }
}

#[derive(Debug)]
pub struct DocumentBuild {
    pub slides: Vec<PendingCompile>,
    pub document: PendingCompile,
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub results: Vec<(EntityId, BuildResult<()>)>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|(_, result)| result.is_ok())
    }

    pub fn built(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.results
            .iter()
            .filter(|(_, result)| result.is_ok())
            .map(|(id, _)| *id)
    }

    pub fn failures(&self) -> impl Iterator<Item = (EntityId, &BuildError)> + '_ {
        self.results
            .iter()
            .filter_map(|(id, result)| result.as_ref().err().map(|err| (*id, err)))
    }

    pub fn halted(&self) -> bool {
        self.failures()
            .any(|(_, err)| matches!(err, BuildError::QueueHalted))
    }
}

pub struct BuildOrchestrator {
    queue: QueueHandle,
    settings: BuildSettings,
    log: BuildLog,
}

impl BuildOrchestrator {
    pub fn new(queue: QueueHandle, settings: BuildSettings, log: BuildLog) -> Self {
        Self {
            queue,
            settings,
            log,
        }
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    pub fn queue(&self) -> &QueueHandle {
        &self.queue
    }

    pub fn paths(&self, document: &Document, id: EntityId) -> BuildResult<Option<EntityPaths>> {
        let dir = document.dir()?;
        let Some(basename) = document.entity(id)?.basename() else {
            return Ok(None);
        };

        let stem = dir.join(basename);
        Ok(Some(EntityPaths {
            source: with_extension(&stem, &self.settings.source_extension),
            artifact: with_extension(&stem, &self.settings.artifact_extension),
            stem,
        }))
    }

    pub fn request_compile(
        &self,
        document: &mut Document,
        id: EntityId,
        stop_on_error: bool,
    ) -> BuildResult<PendingCompile> {
        let template = self.template_for(document, id)?;
        self.ensure_basename(document, id)?;

        let paths = self
            .paths(document, id)?
            .ok_or_else(|| BuildError::UnknownEntity(format!("{} has no basename", id)))?;
        let source = document.composite_source(id)?;

        std::fs::write(&paths.source, source).map_err(|source| BuildError::SourceWrite {
            path: paths.source.clone(),
            source,
        })?;

        let dir = document.dir()?;
        let stages = template.expand(&paths.stem, dir);
        let label = self.label(document, id);
        let (job, handle) = Job::new(label, stages)
            .stop_on_error(stop_on_error)
            .with_completion();

        self.queue.submit(job)?;

        Ok(PendingCompile {
            entity: id,
            revision: document.entity(id)?.revision(),
            artifact: paths.artifact,
            handle,
        })
    }

    // Waits for a queued compile and applies its result to the document.
    // On success the artifact is attached and the entity's compile flag
    // cleared, unless it was edited after the request. A failed stage
    // leaves the entity untouched and stale.
    pub async fn complete(&self, document: &mut Document, pending: PendingCompile) -> BuildResult<()> {
        let PendingCompile {
            entity,
            revision,
            artifact,
            handle,
        } = pending;

        let status = match handle.wait().await {
            Ok(status) => status,
            Err(err) => {
                self.log.warn(
                    LogComponent::Orchestrator,
                    format!("{} was discarded by a halted queue", entity),
                );
                return Err(err);
            }
        };

        if status != 0 {
            self.log.error(
                LogComponent::Orchestrator,
                format!("{} failed to compile (status {})", entity, status),
            );
            return Err(BuildError::StageFailure { status });
        }

        let loaded = Artifact::load(&artifact)?;
        document.entity_mut(entity)?.set_artifact(loaded);

        if document.mark_compiled_at(entity, revision)? {
            self.log
                .info(LogComponent::Orchestrator, format!("{} compiled", entity));
        } else {
            self.log.info(
                LogComponent::Orchestrator,
                format!("{} compiled, but was edited meanwhile and stays stale", entity),
            );
        }
        Ok(())
    }

    pub async fn compile(
        &self,
        document: &mut Document,
        id: EntityId,
        stop_on_error: bool,
    ) -> BuildResult<()> {
        let pending = self.request_compile(document, id, stop_on_error)?;
        self.complete(document, pending).await
    }

    // Queues every stale slide, saves the document if needed, then queues
    // the whole-document build behind them.
    pub fn request_compile_document(&self, document: &mut Document) -> BuildResult<DocumentBuild> {
        let stop_on_error = self.settings.stop_on_error;
        let mut slides = Vec::new();
        let mut assigned = false;

        for slide_id in document.slide_ids() {
            let id = EntityId::Slide(slide_id);
            let entity = document.entity(id)?;
            if !entity.needs_compile() {
                self.log.debug(
                    LogComponent::Orchestrator,
                    format!("{} is up to date", id),
                );
                continue;
            }

            assigned |= entity.basename().is_none();
            slides.push(self.request_compile(document, id, stop_on_error)?);
        }

        if document.is_modified() || assigned {
            document.save()?;
        }

        let pending = self.request_compile(document, EntityId::Document, stop_on_error)?;

        Ok(DocumentBuild {
            slides,
            document: pending,
        })
    }

    pub async fn complete_document(&self, document: &mut Document, build: DocumentBuild) -> BuildReport {
        let mut report = BuildReport::default();

        for pending in build.slides.into_iter().chain(std::iter::once(build.document)) {
            let id = pending.entity();
            let result = self.complete(document, pending).await;
            report.results.push((id, result));
        }

        report
    }

    pub async fn compile_document(&self, document: &mut Document) -> BuildResult<BuildReport> {
        let build = self.request_compile_document(document)?;
        Ok(self.complete_document(document, build).await)
    }

    // Load-time shortcut: reuse an artifact that is at least as new as its
    // source instead of rebuilding. Returns whether it was reused.
    pub fn check_cached(&self, document: &mut Document, id: EntityId) -> BuildResult<bool> {
        let Some(paths) = self.paths(document, id)? else {
            return Ok(false);
        };
        let expected = document.composite_source(id)?;

        match cache::check(&paths.source, &paths.artifact, &expected) {
            CacheStatus::Fresh(artifact) => {
                document.entity_mut(id)?.set_artifact(artifact);
                document.mark_compiled(id)?;
                self.log.info(
                    LogComponent::Orchestrator,
                    format!("{} reused cached {}", id, paths.artifact.display()),
                );
                Ok(true)
            }
            status => {
                self.log.debug(
                    LogComponent::Orchestrator,
                    format!("{} needs a build: {:?}", id, status),
                );
                Ok(false)
            }
        }
    }

    // Runs the cache check over a freshly loaded document and queues what
    // missed. Slide refreshes never halt the queue; the document build
    // follows the configured policy and is queued last.
    pub fn refresh_on_load(&self, document: &mut Document) -> BuildResult<Vec<PendingCompile>> {
        let mut pending = Vec::new();

        for slide_id in document.slide_ids() {
            let id = EntityId::Slide(slide_id);
            if !self.check_cached(document, id)? {
                pending.push(self.request_compile(document, id, false)?);
            }
        }

        if !self.check_cached(document, EntityId::Document)? {
            pending.push(self.request_compile(
                document,
                EntityId::Document,
                self.settings.stop_on_error,
            )?);
        }

        Ok(pending)
    }

    pub fn delete_slide(&self, document: &mut Document, index: usize) -> BuildResult<Slide> {
        let slide = document.remove_slide(index)?;
        if let Ok(dir) = document.dir() {
            let removed = slide.release_files(dir)?;
            self.log.debug(
                LogComponent::Orchestrator,
                format!("released {} file(s) of slide {}", removed, slide.id()),
            );
        }
        Ok(slide)
    }

    // Deletes every slide's build files and the document's build outputs.
    // The document file itself is never touched; slides keep their basenames.
    pub fn clean(&self, document: &Document) -> BuildResult<usize> {
        let dir = document.dir()?;
        let mut removed = 0;

        for slide in document.slides().iter() {
            removed += slide.release_files(dir)?;
        }

        if let Some(paths) = self.paths(document, EntityId::Document)? {
            let mut candidates: Vec<PathBuf> = BY_PRODUCT_EXTENSIONS
                .iter()
                .map(|ext| with_extension(&paths.stem, ext))
                .collect();
            candidates.push(paths.artifact);
            candidates.push(paths.source);

            for path in candidates {
                if Some(path.as_path()) == document.path() || !path.is_file() {
                    continue;
                }
                std::fs::remove_file(&path).map_err(|source| BuildError::Io {
                    path: path.clone(),
                    source,
                })?;
                removed += 1;
            }
        }

        self.log.info(
            LogComponent::Orchestrator,
            format!("removed {} build file(s)", removed),
        );
        Ok(removed)
    }

    fn template_for(&self, document: &Document, id: EntityId) -> BuildResult<&CommandTemplate> {
        if !document.entity(id)?.kind().capabilities().compiles {
            return Err(BuildError::UnknownEntity(format!(
                "{} is not compiled on its own",
                id
            )));
        }

        match id {
            EntityId::Document => Ok(&self.settings.presentation_template),
            _ => Ok(&self.settings.slide_template),
        }
    }

    // Slides get a reserved, unique file stem in the document directory the
    // first time they are compiled. The document's stem comes from its path.
    fn ensure_basename(&self, document: &mut Document, id: EntityId) -> BuildResult<()> {
        if document.entity(id)?.basename().is_some() {
            return Ok(());
        }

        let EntityId::Slide(_) = id else {
            return Err(BuildError::Unsaved);
        };

        let dir = document.dir()?.to_path_buf();
        let reserved = tempfile::Builder::new()
            .prefix(&self.settings.basename_prefix)
            .rand_bytes(6)
            .tempfile_in(&dir)
            .map_err(|source| BuildError::Io {
                path: dir.clone(),
                source,
            })?;
        let (_, path) = reserved.keep().map_err(|err| BuildError::Io {
            path: dir.clone(),
            source: err.error,
        })?;

        let basename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| BuildError::Io {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
            })?;

        self.log.debug(
            LogComponent::Orchestrator,
            format!("{} uses basename {}", id, basename),
        );
        document.entity_mut(id)?.set_basename(basename);
        Ok(())
    }

    fn label(&self, document: &Document, id: EntityId) -> String {
        match id {
            EntityId::Slide(slide) => match document.slides().position(slide) {
                Some(index) => format!("slide {}", index + 1),
                None => id.to_string(),
            },
            _ => id.to_string(),
        }
    }
}

fn with_extension(stem: &Path, extension: &str) -> PathBuf {
    let mut path = stem.as_os_str().to_owned();
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}
