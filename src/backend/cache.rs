use image::DynamicImage;
use std::collections::HashMap;
use std::sync::Arc;

pub type Bitmap = Arc<DynamicImage>;

/// Decoded bitmaps by sequence position.
///
/// Entries are never evicted or replaced: the first bitmap stored for a
/// position wins for the lifetime of the session.
#[derive(Default)]
pub struct ImageCache {
    images: HashMap<usize, Bitmap>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bitmap` unless the position is already cached.
    /// Returns `true` when the entry was newly created.
    pub fn insert(&mut self, position: usize, bitmap: Bitmap) -> bool {
        if self.images.contains_key(&position) {
            return false;
        }
        self.images.insert(position, bitmap);
        true
    }

    pub fn get(&self, position: usize) -> Option<&Bitmap> {
        self.images.get(&position)
    }

    pub fn contains(&self, position: usize) -> bool {
        self.images.contains_key(&position)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(width: u32) -> Bitmap {
        Arc::new(DynamicImage::new_rgba8(width, 1))
    }

    #[test]
    fn test_insert_is_first_write_wins() {
        let mut cache = ImageCache::new();
        assert!(cache.insert(3, bitmap(10)));
        assert!(!cache.insert(3, bitmap(20)));

        assert_eq!(cache.get(3).map(|b| b.width()), Some(10));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_absent_positions() {
        let mut cache = ImageCache::new();
        cache.insert(0, bitmap(1));
        assert!(cache.contains(0));
        assert!(!cache.contains(1));
        assert!(cache.get(1).is_none());
    }
}
