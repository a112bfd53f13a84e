use std::collections::VecDeque;

use crate::raster::RasterImage;

// ============================================================================
// HISTORY STACK — bounded snapshot log with a cursor
// ============================================================================

/// Default number of snapshots kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

struct HistoryEntry {
    image: RasterImage,
    description: String,
}

/// Linear undo/redo log of full-image snapshots.
///
/// `cursor` points at the entry currently shown. Pushing after an undo drops
/// the redo branch; pushing past `limit` evicts the oldest entry.
pub struct HistoryStack {
    entries: VecDeque<HistoryEntry>,
    cursor: Option<usize>,
    limit: usize,
    /// Snapshot restored by `reset()`.
    initial: Option<RasterImage>,
    /// Running pixel-byte total of all entries.
    total_memory: usize,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl HistoryStack {
    /// An empty history with no initial snapshot. A limit of 0 is treated as 1.
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: None,
            limit: limit.max(1),
            initial: None,
            total_memory: 0,
        }
    }

    /// A history whose first entry, and reset target, is `initial`.
    pub fn with_initial(initial: RasterImage, limit: usize) -> Self {
        let mut history = Self::new(limit);
        history.initial = Some(initial.clone());
        history.push_labeled(initial, "Open");
        history
    }

    pub fn push(&mut self, image: RasterImage) {
        self.push_labeled(image, "Edit");
    }

    pub fn push_labeled(&mut self, image: RasterImage, description: impl Into<String>) {
        // Drop the redo branch
        let keep = self.cursor.map_or(0, |c| c + 1);
        while self.entries.len() > keep {
            if let Some(removed) = self.entries.pop_back() {
                self.total_memory = self.total_memory.saturating_sub(removed.image.memory_bytes());
            }
        }

        self.total_memory += image.memory_bytes();
        self.entries.push_back(HistoryEntry {
            image,
            description: description.into(),
        });
        self.cursor = Some(self.entries.len() - 1);

        self.prune();
    }

    /// Step back one entry and return it.
    pub fn undo(&mut self) -> Option<RasterImage> {
        let cursor = self.cursor.filter(|&c| c > 0)? - 1;
        self.cursor = Some(cursor);
        self.entries.get(cursor).map(|e| e.image.clone())
    }

    /// Step forward one entry and return it.
    pub fn redo(&mut self) -> Option<RasterImage> {
        let cursor = self.cursor.filter(|&c| c + 1 < self.entries.len())? + 1;
        self.cursor = Some(cursor);
        self.entries.get(cursor).map(|e| e.image.clone())
    }

    /// Return to the initial snapshot with the cursor at 0.
    ///
    /// Recorded entries are kept, so `redo()` walks forward through them again.
    /// If eviction already dropped the initial entry it takes the oldest slot
    /// back. Without an initial snapshot the history is cleared and `None`
    /// returned.
    pub fn reset(&mut self) -> Option<RasterImage> {
        let Some(initial) = self.initial.clone() else {
            self.clear();
            return None;
        };
        let front_is_initial = self
            .entries
            .front()
            .is_some_and(|e| e.image.same_pixels(&initial));
        if !front_is_initial {
            if self.entries.len() >= self.limit
                && let Some(evicted) = self.entries.pop_front()
            {
                self.total_memory = self.total_memory.saturating_sub(evicted.image.memory_bytes());
            }
            self.total_memory += initial.memory_bytes();
            self.entries.push_front(HistoryEntry {
                image: initial.clone(),
                description: "Open".to_string(),
            });
        }
        self.cursor = Some(0);
        Some(initial)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.entries.len())
    }

    /// Entry under the cursor.
    pub fn current(&self) -> Option<&RasterImage> {
        self.entries.get(self.cursor?).map(|e| &e.image)
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn get(&self, index: usize) -> Option<&RasterImage> {
        self.entries.get(index).map(|e| &e.image)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Descriptions, oldest first.
    pub fn descriptions(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.description.clone()).collect()
    }

    /// Current memory usage of stored pixels (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
        self.total_memory = 0;
    }

    /// Evict the oldest entries until within `limit`, keeping the cursor on the
    /// same logical entry.
    fn prune(&mut self) {
        while self.entries.len() > self.limit {
            if let Some(removed) = self.entries.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.image.memory_bytes());
                self.cursor = self.cursor.map(|c| c.saturating_sub(1));
            }
        }
    }
}
