pub mod format;
pub mod slides;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::Artifact;
use crate::error::{BuildError, BuildResult};
use crate::staleness::{EntityKind, Staleness};

pub use format::SEPARATOR;
pub use slides::SlideList;

static NEXT_SLIDE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlideId(u64);

impl fmt::Display for SlideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityId {
    Header,
    Footer,
    Slide(SlideId),
    Document,
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Header => write!(f, "header"),
            EntityId::Footer => write!(f, "footer"),
            EntityId::Slide(id) => write!(f, "slide {}", id),
            EntityId::Document => write!(f, "document"),
        }
    }
}

#[derive(Debug)]
pub struct Entity {
    kind: EntityKind,
    content: String,
    artifact: Option<Artifact>,
    basename: Option<String>,
    pub(crate) staleness: Staleness,
    pub(crate) revision: u64,
}

impl Entity {
    pub fn new(kind: EntityKind, content: String) -> Self {
        Self {
            kind,
            content,
            artifact: None,
            basename: None,
            staleness: Staleness::new_entity(),
            revision: 0,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub(crate) fn replace_content(&mut self, content: String) {
        self.content = content;
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn set_artifact(&mut self, artifact: Artifact) {
        self.artifact = Some(artifact);
    }

    pub fn basename(&self) -> Option<&str> {
        self.basename.as_deref()
    }

    pub(crate) fn set_basename(&mut self, basename: String) {
        self.basename = Some(basename);
    }

    pub fn staleness(&self) -> Staleness {
        self.staleness
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn needs_compile(&self) -> bool {
        self.kind.capabilities().tracks_compile && self.staleness.modified_since_compile
    }
}

#[derive(Debug)]
pub struct Slide {
    id: SlideId,
    entity: Entity,
}

impl Slide {
    pub fn new(content: String) -> Self {
        Self {
            id: SlideId(NEXT_SLIDE_ID.fetch_add(1, Ordering::Relaxed)),
            entity: Entity::new(EntityKind::Slide, content),
        }
    }

    pub(crate) fn with_basename(content: String, basename: Option<String>) -> Self {
        let mut slide = Self::new(content);
        slide.entity.basename = basename;
        slide
    }

    pub fn id(&self) -> SlideId {
        self.id
    }

    pub fn content(&self) -> &str {
        self.entity.content()
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }

    // Removes `<basename>` and `<basename>.<ext>` files, returning the count.
    pub fn release_files(&self, dir: &Path) -> BuildResult<usize> {
        let Some(basename) = self.entity.basename() else {
            return Ok(0);
        };

        let entries = std::fs::read_dir(dir).map_err(|source| BuildError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut removed = 0;
        for entry in entries.flatten() {
            let matches = entry
                .file_name()
                .to_str()
                .map(|name| owned_by(name, basename))
                .unwrap_or(false);
            if matches && entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                let path = entry.path();
                std::fs::remove_file(&path).map_err(|source| BuildError::Io { path, source })?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[derive(Debug)]
pub struct Document {
    path: Option<PathBuf>,
    header: Entity,
    footer: Entity,
    root: Entity,
    slides: SlideList,
    pub(crate) order_changed: bool,
}

impl Document {
    pub fn new(header: String, footer: String) -> Self {
        Self {
            path: None,
            header: Entity::new(EntityKind::HeaderFooter, header),
            footer: Entity::new(EntityKind::HeaderFooter, footer),
            root: Entity::new(EntityKind::DocumentRoot, String::new()),
            slides: SlideList::new(),
            order_changed: false,
        }
    }

    pub fn load(path: &Path) -> BuildResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut document = format::parse(&text)?;
        document.set_path(absolute(path));
        Ok(document)
    }

    pub fn save(&mut self) -> BuildResult<()> {
        let path = self.path.clone().ok_or(BuildError::Unsaved)?;
        std::fs::write(&path, format::write(self))
            .map_err(|source| BuildError::Io { path, source })?;
        self.mark_all_saved();
        Ok(())
    }

    pub fn save_as(&mut self, path: &Path) -> BuildResult<()> {
        self.set_path(absolute(path));
        self.save()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.root.set_basename(stem);
        self.path = Some(path);
    }

    pub fn dir(&self) -> BuildResult<&Path> {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .ok_or(BuildError::Unsaved)
    }

    pub fn header(&self) -> &Entity {
        &self.header
    }

    pub fn footer(&self) -> &Entity {
        &self.footer
    }

    pub fn root(&self) -> &Entity {
        &self.root
    }

    pub fn slides(&self) -> &SlideList {
        &self.slides
    }

    pub fn order_changed(&self) -> bool {
        self.order_changed
    }

    pub fn slide_ids(&self) -> Vec<SlideId> {
        self.slides.iter().map(Slide::id).collect()
    }

    pub fn slide_at(&self, index: usize) -> BuildResult<SlideId> {
        self.slides
            .get(index)
            .map(Slide::id)
            .ok_or_else(|| BuildError::UnknownEntity(format!("slide index {}", index)))
    }

    pub fn slide(&self, id: SlideId) -> Option<&Slide> {
        self.slides.iter().find(|s| s.id() == id)
    }

    pub fn entity(&self, id: EntityId) -> BuildResult<&Entity> {
        match id {
            EntityId::Header => Ok(&self.header),
            EntityId::Footer => Ok(&self.footer),
            EntityId::Document => Ok(&self.root),
            EntityId::Slide(slide) => self
                .slide(slide)
                .map(Slide::entity)
                .ok_or_else(|| BuildError::UnknownEntity(id.to_string())),
        }
    }

    pub fn entity_mut(&mut self, id: EntityId) -> BuildResult<&mut Entity> {
        match id {
            EntityId::Header => Ok(&mut self.header),
            EntityId::Footer => Ok(&mut self.footer),
            EntityId::Document => Ok(&mut self.root),
            EntityId::Slide(slide) => self
                .slides
                .iter_mut()
                .find(|s| s.id() == slide)
                .map(Slide::entity_mut)
                .ok_or_else(|| BuildError::UnknownEntity(id.to_string())),
        }
    }

    // Text the typesetter sees for `id`: header, slide, footer joined by
    // the separator for a slide; the whole file for the document.
    pub fn composite_source(&self, id: EntityId) -> BuildResult<String> {
        match id {
            EntityId::Slide(_) => {
                let slide = self.entity(id)?;
                Ok(format!(
                    "{}{}{}{}{}",
                    self.header.content(),
                    SEPARATOR,
                    slide.content(),
                    SEPARATOR,
                    self.footer.content()
                ))
            }
            EntityId::Document => Ok(format::write(self)),
            EntityId::Header | EntityId::Footer => Err(BuildError::UnknownEntity(format!(
                "{} is not compiled on its own",
                id
            ))),
        }
    }

    pub(crate) fn push_loaded_slide(&mut self, slide: Slide) {
        self.slides.push(slide);
    }

    pub fn insert_slide(&mut self, index: usize, content: String) -> BuildResult<SlideId> {
        let slide = Slide::new(content);
        let id = slide.id();
        self.slides.insert_at(index, slide)?;
        self.structure_changed();
        Ok(id)
    }

    pub fn append_slide(&mut self, content: String) -> SlideId {
        let slide = Slide::new(content);
        let id = slide.id();
        self.slides.push(slide);
        self.structure_changed();
        id
    }

    // Removes a slide from the sequence. The caller owns releasing its files.
    pub fn remove_slide(&mut self, index: usize) -> BuildResult<Slide> {
        let slide = self.slides.remove_at(index)?;
        self.structure_changed();
        Ok(slide)
    }

    pub fn move_slides(&mut self, from: usize, count: usize, to: usize) -> BuildResult<()> {
        self.slides.move_range(from, count, to)?;
        self.structure_changed();
        Ok(())
    }

    pub(crate) fn slides_mut(&mut self) -> &mut SlideList {
        &mut self.slides
    }

    pub(crate) fn header_mut(&mut self) -> &mut Entity {
        &mut self.header
    }

    pub(crate) fn footer_mut(&mut self) -> &mut Entity {
        &mut self.footer
    }

    pub(crate) fn root_mut(&mut self) -> &mut Entity {
        &mut self.root
    }
}

fn owned_by(name: &str, basename: &str) -> bool {
    match name.strip_prefix(basename) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
