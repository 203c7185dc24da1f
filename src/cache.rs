use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use crate::page::Pixbuf;

/// Page indices worth keeping decoded around `cursor`.
///
/// Always covers the displayed page(s); with caching on it also reaches
/// `back_step` pages behind and `fwd_step` pages past them.
pub fn wanted_window(
    cursor: usize,
    pages: usize,
    double_page: bool,
    caching: bool,
    back_step: usize,
    fwd_step: usize,
) -> Range<usize> {
    let mut first = cursor;
    let mut last = cursor + 1;
    if double_page {
        last += 1;
    }
    if caching {
        first = first.saturating_sub(back_step);
        last += fwd_step;
    }
    let last = last.min(pages);
    first.min(last)..last
}

// ---------------------------------------------------------------------------
// Pixel cache
// ---------------------------------------------------------------------------

/// Decoded pages keyed by page index, trimmed to a window around the
/// current page.
#[derive(Default)]
pub struct PixelCache {
    images: HashMap<usize, Arc<Pixbuf>>,
    used_bytes: u64,
}

impl PixelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, idx: usize) -> Option<Arc<Pixbuf>> {
        self.images.get(&idx).cloned()
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.images.contains_key(&idx)
    }

    pub fn insert(&mut self, idx: usize, pixbuf: Arc<Pixbuf>) {
        self.used_bytes += pixbuf.mem_size();
        if let Some(old) = self.images.insert(idx, pixbuf) {
            self.used_bytes -= old.mem_size();
        }
    }

    /// Cached page `idx`, running `decode` to produce it on a miss.
    pub fn get_or_decode<F>(&mut self, idx: usize, decode: F) -> Arc<Pixbuf>
    where
        F: FnOnce() -> Arc<Pixbuf>,
    {
        if let Some(hit) = self.images.get(&idx) {
            return Arc::clone(hit);
        }
        let pixbuf = decode();
        self.insert(idx, Arc::clone(&pixbuf));
        pixbuf
    }

    /// Drop every entry outside `wanted`. Returns how many were dropped.
    pub fn reconcile(&mut self, wanted: &Range<usize>) -> usize {
        let before = self.images.len();
        let mut freed = 0u64;
        self.images.retain(|idx, img| {
            let keep = wanted.contains(idx);
            if !keep {
                freed += img.mem_size();
            }
            keep
        });
        self.used_bytes -= freed;
        let evicted = before - self.images.len();
        if evicted > 0 {
            self.images.shrink_to_fit();
            log::debug!(
                "[cache] evicted {} pages, keeping {:?} ({:.1} MB)",
                evicted,
                wanted,
                self.used_bytes as f64 / (1024.0 * 1024.0)
            );
        }
        evicted
    }

    /// Indices in `wanted` that still need decoding.
    pub fn missing(&self, wanted: &Range<usize>) -> Vec<usize> {
        wanted.clone().filter(|i| !self.contains(*i)).collect()
    }

    pub fn clear(&mut self) {
        self.images.clear();
        self.images.shrink_to_fit();
        self.used_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }
}
