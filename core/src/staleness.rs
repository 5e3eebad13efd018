// Dirty tracking for every entity of a document.
// Each entity carries two independent flags. Header and footer edits do
// not mark themselves as needing a compile; they invalidate every slide
// instead, through `Document::propagate_compile_invalidation`.

use serde::Serialize;

use crate::document::{Document, EntityId};
use crate::error::BuildResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Staleness {
    pub modified_since_save: bool,
    pub modified_since_compile: bool,
}

impl Staleness {
    pub fn new_entity() -> Self {
        Self {
            modified_since_save: false,
            modified_since_compile: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityKind {
    Slide,
    HeaderFooter,
    DocumentRoot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    // Has an artifact of its own.
    pub compiles: bool,
    // Its `modified_since_compile` flag is meaningful.
    pub tracks_compile: bool,
    // Its `modified_since_save` flag feeds the document-level modified bit.
    pub tracks_save: bool,
    // Edits invalidate every slide's artifact.
    pub invalidates_slides: bool,
}

impl EntityKind {
    pub const fn capabilities(self) -> Capabilities {
        match self {
            EntityKind::Slide => Capabilities {
                compiles: true,
                tracks_compile: true,
                tracks_save: true,
                invalidates_slides: false,
            },
            EntityKind::HeaderFooter => Capabilities {
                compiles: false,
                tracks_compile: false,
                tracks_save: true,
                invalidates_slides: true,
            },
            EntityKind::DocumentRoot => Capabilities {
                compiles: true,
                tracks_compile: true,
                tracks_save: false,
                invalidates_slides: false,
            },
        }
    }
}

impl Document {
    pub fn set_content(&mut self, id: EntityId, text: String) -> BuildResult<()> {
        let entity = self.entity_mut(id)?;
        entity.replace_content(text);
        entity.staleness.modified_since_save = true;
        entity.staleness.modified_since_compile = true;
        entity.revision += 1;
        let cascades = entity.kind().capabilities().invalidates_slides;

        if cascades {
            self.propagate_compile_invalidation();
        }
        self.invalidate_root();
        Ok(())
    }

    // Every slide artifact embeds the header and footer.
    pub fn propagate_compile_invalidation(&mut self) {
        for slide in self.slides_mut().iter_mut() {
            let entity = slide.entity_mut();
            entity.staleness.modified_since_compile = true;
            entity.revision += 1;
        }
    }

    pub fn mark_saved(&mut self, id: EntityId) -> BuildResult<()> {
        self.entity_mut(id)?.staleness.modified_since_save = false;
        Ok(())
    }

    // Clears `modified_since_save` everywhere, plus the order-changed flag.
    // Compile flags are left alone.
    pub fn mark_all_saved(&mut self) {
        self.header_mut().staleness.modified_since_save = false;
        self.footer_mut().staleness.modified_since_save = false;
        self.root_mut().staleness.modified_since_save = false;
        for slide in self.slides_mut().iter_mut() {
            slide.entity_mut().staleness.modified_since_save = false;
        }
        self.order_changed = false;
    }

    pub fn mark_compiled(&mut self, id: EntityId) -> BuildResult<()> {
        self.entity_mut(id)?.staleness.modified_since_compile = false;
        Ok(())
    }

    // Only clears the flag if the entity is still at `revision`.
    pub fn mark_compiled_at(&mut self, id: EntityId, revision: u64) -> BuildResult<bool> {
        let entity = self.entity_mut(id)?;
        if entity.revision != revision {
            return Ok(false);
        }
        entity.staleness.modified_since_compile = false;
        Ok(true)
    }

    pub fn is_modified(&self) -> bool {
        let tracked = |kind: EntityKind| kind.capabilities().tracks_save;

        self.order_changed
            || (tracked(self.header().kind()) && self.header().staleness().modified_since_save)
            || (tracked(self.footer().kind()) && self.footer().staleness().modified_since_save)
            || self
                .slides()
                .iter()
                .any(|s| s.entity().staleness().modified_since_save)
    }

    pub(crate) fn structure_changed(&mut self) {
        self.order_changed = true;
        self.invalidate_root();
    }

    fn invalidate_root(&mut self) {
        let root = self.root_mut();
        root.staleness.modified_since_compile = true;
        root.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn document_with_clean_slides(n: usize) -> Document {
        let mut doc = Document::new("H".to_string(), "F".to_string());
        for i in 0..n {
            doc.append_slide(format!("slide {i}"));
        }
        for id in doc.slide_ids() {
            doc.mark_compiled(EntityId::Slide(id)).unwrap();
        }
        doc.mark_all_saved();
        doc
    }

    fn needs_compile(doc: &Document, index: usize) -> bool {
        doc.slides().get(index).unwrap().entity().needs_compile()
    }

    #[test]
    fn test_header_edit_invalidates_every_slide() {
        let mut doc = document_with_clean_slides(3);
        assert!(!needs_compile(&doc, 0));

        doc.set_content(EntityId::Header, "H2".to_string()).unwrap();

        assert!((0..3).all(|i| needs_compile(&doc, i)));
        assert!(!doc.header().needs_compile());
        assert!(doc.is_modified());
    }

    #[test]
    fn test_footer_edit_invalidates_every_slide() {
        let mut doc = document_with_clean_slides(2);
        doc.set_content(EntityId::Footer, "F2".to_string()).unwrap();
        assert!(needs_compile(&doc, 0) && needs_compile(&doc, 1));
    }

    #[test]
    fn test_slide_edit_is_local() {
        let mut doc = document_with_clean_slides(3);
        let target = doc.slide_at(1).unwrap();

        doc.set_content(EntityId::Slide(target), "new".to_string()).unwrap();

        assert!(!needs_compile(&doc, 0));
        assert!(needs_compile(&doc, 1));
        assert!(!needs_compile(&doc, 2));
        assert!(doc.root().needs_compile());
    }

    #[test]
    fn test_save_clears_save_flags_only() {
        let mut doc = document_with_clean_slides(2);
        let target = doc.slide_at(0).unwrap();
        doc.set_content(EntityId::Slide(target), "edited".to_string()).unwrap();
        doc.set_content(EntityId::Header, "H2".to_string()).unwrap();
        assert!(doc.is_modified());

        doc.mark_all_saved();

        assert!(!doc.is_modified());
        assert!(doc
            .slides()
            .iter()
            .all(|s| !s.entity().staleness().modified_since_save));
        assert!(needs_compile(&doc, 0) && needs_compile(&doc, 1));
    }

    #[test]
    fn test_compile_clears_one_entity() {
        let mut doc = document_with_clean_slides(2);
        doc.set_content(EntityId::Header, "H2".to_string()).unwrap();
        let first = doc.slide_at(0).unwrap();

        doc.mark_compiled(EntityId::Slide(first)).unwrap();

        assert!(!needs_compile(&doc, 0));
        assert!(needs_compile(&doc, 1));
        assert!(doc.is_modified());
    }

    #[test]
    fn test_structural_edits_set_order_changed() {
        let mut doc = document_with_clean_slides(3);
        assert!(!doc.is_modified());

        doc.move_slides(0, 1, 2).unwrap();
        assert!(doc.order_changed());
        assert!(doc.is_modified());
        doc.mark_all_saved();

        doc.remove_slide(0).unwrap();
        assert!(doc.is_modified());
        doc.mark_all_saved();

        doc.insert_slide(0, String::new()).unwrap();
        assert!(doc.is_modified());
    }

    #[test]
    fn test_stale_completion_does_not_clear_flag() {
        let mut doc = document_with_clean_slides(1);
        let id = EntityId::Slide(doc.slide_at(0).unwrap());
        doc.set_content(id, "v1".to_string()).unwrap();
        let requested_at = doc.entity(id).unwrap().revision();

        doc.set_content(EntityId::Header, "H2".to_string()).unwrap();

        assert!(!doc.mark_compiled_at(id, requested_at).unwrap());
        assert!(needs_compile(&doc, 0));

        let current = doc.entity(id).unwrap().revision();
        assert!(doc.mark_compiled_at(id, current).unwrap());
        assert!(!needs_compile(&doc, 0));
    }

    #[test]
    fn test_capability_table() {
        assert!(!EntityKind::HeaderFooter.capabilities().tracks_compile);
        assert!(EntityKind::HeaderFooter.capabilities().invalidates_slides);
        assert!(EntityKind::Slide.capabilities().compiles);
        assert!(!EntityKind::DocumentRoot.capabilities().tracks_save);
    }
}
