use crate::error::{BuildError, BuildResult};

use super::Slide;

#[derive(Debug, Default)]
pub struct SlideList {
    slides: Vec<Slide>,
    version: u64,
}

impl SlideList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Slide> {
        self.slides.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Slide> {
        self.slides.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Slide> {
        self.slides.get_mut(index)
    }

    pub fn position(&self, id: super::SlideId) -> Option<usize> {
        self.slides.iter().position(|s| s.id() == id)
    }

    pub(crate) fn push(&mut self, slide: Slide) {
        self.slides.push(slide);
        self.version += 1;
    }

    pub fn insert_at(&mut self, index: usize, slide: Slide) -> BuildResult<()> {
        if index > self.slides.len() {
            return Err(out_of_range(index, self.slides.len()));
        }
        self.slides.insert(index, slide);
        self.version += 1;
        Ok(())
    }

    pub fn remove_at(&mut self, index: usize) -> BuildResult<Slide> {
        if index >= self.slides.len() {
            return Err(out_of_range(index, self.slides.len()));
        }
        self.version += 1;
        Ok(self.slides.remove(index))
    }

    // Moves `count` slides starting at `from` so the first of them ends up
    // at index `to` of the resulting list.
    pub fn move_range(&mut self, from: usize, count: usize, to: usize) -> BuildResult<()> {
        let end = from
            .checked_add(count)
            .filter(|end| count > 0 && *end <= self.slides.len())
            .ok_or_else(|| out_of_range(from + count.saturating_sub(1), self.slides.len()))?;

        let remaining = self.slides.len() - count;
        if to > remaining {
            return Err(out_of_range(to, remaining));
        }

        let moved: Vec<Slide> = self.slides.drain(from..end).collect();
        self.slides.splice(to..to, moved);
        self.version += 1;
        Ok(())
    }
}

fn out_of_range(index: usize, len: usize) -> BuildError {
    BuildError::UnknownEntity(format!("slide index {} (document has {} slides)", index, len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Slide;

    fn list(contents: &[&str]) -> SlideList {
        let mut list = SlideList::new();
        for content in contents {
            list.push(Slide::new(content.to_string()));
        }
        list
    }

    fn contents(list: &SlideList) -> Vec<String> {
        list.iter().map(|s| s.content().to_string()).collect()
    }

    #[test]
    fn test_insert_and_remove() {
        let mut slides = list(&["a", "c"]);
        let version = slides.version();

        slides.insert_at(1, Slide::new("b".to_string())).unwrap();
        assert_eq!(contents(&slides), vec!["a", "b", "c"]);
        assert!(slides.version() > version);

        let removed = slides.remove_at(0).unwrap();
        assert_eq!(removed.content(), "a");
        assert!(slides.remove_at(5).is_err());
        assert!(slides.insert_at(9, Slide::new(String::new())).is_err());
    }

    #[test]
    fn test_move_range() {
        let mut slides = list(&["a", "b", "c", "d", "e"]);

        slides.move_range(1, 2, 3).unwrap();
        assert_eq!(contents(&slides), vec!["a", "d", "e", "b", "c"]);

        slides.move_range(3, 2, 0).unwrap();
        assert_eq!(contents(&slides), vec!["b", "c", "a", "d", "e"]);

        assert!(slides.move_range(4, 2, 0).is_err());
        assert!(slides.move_range(0, 0, 0).is_err());
        assert!(slides.move_range(0, 1, 5).is_err());
    }
}
