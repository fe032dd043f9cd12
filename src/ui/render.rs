use crate::backend::cache::{Bitmap, ImageCache};

/// Where bitmaps end up on screen.
pub trait RenderSink {
    /// Replaces whatever was drawn before with `bitmap`.
    fn draw(&mut self, position: usize, bitmap: &Bitmap);
}

/// Coalesces render requests until the next display refresh.
///
/// Only the latest request survives a refresh; a request whose bitmap is not
/// cached yet is dropped, since the fetch completion re-requests it.
#[derive(Debug, Default)]
pub struct FrameQueue {
    pending: Option<usize>,
    rendered: Option<usize>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, position: usize) {
        self.pending = Some(position);
    }

    pub fn rendered(&self) -> Option<usize> {
        self.rendered
    }

    pub fn flush<S: RenderSink>(&mut self, cache: &ImageCache, sink: &mut S) -> Option<usize> {
        let position = self.pending.take()?;
        let bitmap = cache.get(position)?;
        sink.draw(position, bitmap);
        self.rendered = Some(position);
        Some(position)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Default)]
    pub struct RecordingSink {
        pub drawn: Vec<usize>,
        pub surface: Option<(u32, u32)>,
    }

    impl RenderSink for RecordingSink {
        fn draw(&mut self, position: usize, bitmap: &Bitmap) {
            self.drawn.push(position);
            self.surface = Some((bitmap.width(), bitmap.height()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use image::DynamicImage;
    use std::sync::Arc;

    fn cache_with(positions: &[usize]) -> ImageCache {
        let mut cache = ImageCache::new();
        for &p in positions {
            cache.insert(p, Arc::new(DynamicImage::new_rgba8(p as u32 + 1, 2)));
        }
        cache
    }

    #[test]
    fn test_only_latest_request_is_drawn() {
        let cache = cache_with(&[1, 2, 3]);
        let mut frames = FrameQueue::new();
        let mut sink = RecordingSink::default();

        frames.request(1);
        frames.request(2);
        frames.request(3);
        assert_eq!(frames.flush(&cache, &mut sink), Some(3));
        assert_eq!(sink.drawn, vec![3]);
        assert_eq!(sink.surface, Some((4, 2)));
        assert_eq!(frames.rendered(), Some(3));

        assert_eq!(frames.flush(&cache, &mut sink), None);
        assert_eq!(sink.drawn, vec![3]);
    }

    #[test]
    fn test_uncached_request_is_dropped() {
        let cache = cache_with(&[0]);
        let mut frames = FrameQueue::new();
        let mut sink = RecordingSink::default();

        frames.request(0);
        frames.flush(&cache, &mut sink);
        frames.request(5);
        assert_eq!(frames.flush(&cache, &mut sink), None);
        assert_eq!(frames.rendered(), Some(0));
        assert_eq!(frames.flush(&cache, &mut sink), None);
        assert_eq!(sink.drawn, vec![0]);
    }
}
