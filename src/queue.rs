use arrayvec::ArrayVec;

use crate::Error;
use crate::pool::{ItemId, ItemPool};

/// Initial size of the bucket backing array.
const INITIAL_MAX_BUCKET: usize = 1024;

/// Largest number of items sampled during bucket width re-estimation.
const MAX_SAMPLES: usize = 25;

/// Resize re-entrancy guard. Width re-estimation extracts and re-inserts
/// items through the ordinary operations, which must not trigger a nested
/// resize while one is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResizeState {
    Idle,
    Resizing,
}

/// A calendar priority queue with amortized O(1) insert and extract-max.
///
/// Priorities map to buckets cyclically, like days repeating across years:
/// buckets cover `bucket_width` units of priority each and repeat every
/// `n_bucket * bucket_width` units. The bucket count doubles or halves as
/// the item count crosses thresholds, and the bucket width is re-estimated
/// from the live priority distribution on every resize.
///
/// Entries are caller-owned in meaning: the queue stores them but never
/// inspects or mutates them.
pub struct CalendarQueue<E> {
    pool: ItemPool<E>,
    /// Backing array; the live window is `bucket_base..bucket_base + n_bucket`.
    buckets: Vec<Option<ItemId>>,
    n_item: usize,
    /// Number of live buckets; a power of two, at least 2.
    n_bucket: usize,
    grow_threshold: usize,
    shrink_threshold: usize,
    /// Bucket of the last maximum, where the guided search starts.
    last_idx: usize,
    /// Priority of the last maximum.
    last_priority: f64,
    /// Lower edge of the current "year"; bounds the guided search.
    bucket_min: f64,
    /// Span of priority covered by one bucket. Always positive.
    bucket_width: f64,
    /// Offset of the live window into the backing array. Toggles between the
    /// two ends on rehash, so the old window can be read while the new one
    /// is written without a second allocation.
    bucket_base: usize,
    state: ResizeState,
}

impl<E> CalendarQueue<E> {
    /// Creates an empty queue with 2 buckets of width 1.0.
    pub fn new() -> Result<Self, Error> {
        let mut buckets = Vec::new();
        buckets.try_reserve(INITIAL_MAX_BUCKET)?;
        buckets.resize(INITIAL_MAX_BUCKET, None);
        Ok(Self {
            pool: ItemPool::new(),
            buckets,
            n_item: 0,
            n_bucket: 2,
            grow_threshold: 8,
            shrink_threshold: 0,
            last_idx: 0,
            last_priority: 0.0,
            bucket_min: -1.0,
            bucket_width: 1.0,
            bucket_base: 0,
            state: ResizeState::Idle,
        })
    }

    /// Number of items currently linked into the queue.
    pub fn len(&self) -> usize {
        self.n_item
    }

    pub fn is_empty(&self) -> bool {
        self.n_item == 0
    }

    /// Creates an unlinked item without inserting it.
    ///
    /// The priority must be non-negative (and not NaN, which would corrupt
    /// the sorted bucket lists).
    pub fn new_item(&mut self, priority: f64, entry: E) -> Result<ItemId, Error> {
        if priority.is_nan() || priority < 0.0 {
            return Err(Error::InvalidPriority(priority));
        }
        self.pool.new_item(priority, entry)
    }

    /// Inserts an unlinked item.
    ///
    /// The item must have come from [`new_item`](Self::new_item) or
    /// [`unlink_max`](Self::unlink_max) and must not currently be linked.
    /// Fails only if the insert forces a grow and the bucket array cannot be
    /// enlarged; the queue is left unchanged in that case.
    pub fn insert(&mut self, id: ItemId) -> Result<(), Error> {
        if self.n_item >= self.grow_threshold && self.state == ResizeState::Idle {
            self.grow()?;
        }
        self.place(id);
        Ok(())
    }

    /// Creates an item and inserts it, returning its handle.
    pub fn insert_entry(&mut self, priority: f64, entry: E) -> Result<ItemId, Error> {
        let id = self.new_item(priority, entry)?;
        self.insert(id)?;
        Ok(id)
    }

    /// Unlinks and returns the highest-priority item, or `None` if the
    /// queue is empty. Ties drain in a deterministic but unspecified order.
    pub fn unlink_max(&mut self) -> Option<ItemId> {
        if self.n_item == 0 {
            return None;
        }
        let mut found = None;
        if self.bucket_min > 0.0 {
            // Guided search: having just removed the previous maximum, the
            // new one is almost always in the same year or the one below it.
            let mut idx = self.last_idx;
            loop {
                if let Some(head) = self.buckets[self.bucket_base + idx] {
                    if self.pool.item(head).priority >= self.bucket_min {
                        found = Some(idx);
                        break;
                    }
                }
                idx = (idx + 1) % self.n_bucket;
                self.bucket_min -= self.bucket_width;
                if idx == self.last_idx || self.bucket_min <= 0.0 {
                    break;
                }
            }
        }
        let idx = match found {
            Some(idx) => idx,
            None => {
                // The guided search exhausted a full cycle; scan every
                // bucket head for the global maximum.
                let mut best: Option<(usize, f64)> = None;
                for idx in 0..self.n_bucket {
                    if let Some(head) = self.buckets[self.bucket_base + idx] {
                        let priority = self.pool.item(head).priority;
                        if best.map_or(true, |(_, p)| priority > p) {
                            best = Some((idx, priority));
                        }
                    }
                }
                best?.0
            }
        };
        let id = self.unlink_head(self.bucket_base + idx)?;
        let priority = self.pool.item(id).priority;
        self.last_idx = idx;
        self.last_priority = priority;
        self.bucket_min = (priority / self.bucket_width).floor() * self.bucket_width;
        self.n_item -= 1;
        if self.n_item < self.shrink_threshold && self.state == ResizeState::Idle {
            self.shrink();
        }
        Some(id)
    }

    /// Returns an unlinked item to the pool. Freeing an item that is still
    /// linked corrupts its bucket list.
    pub fn free_item(&mut self, id: ItemId) {
        self.pool.free_item(id);
    }

    /// Priority of an item, linked or unlinked.
    pub fn priority(&self, id: ItemId) -> f64 {
        self.pool.item(id).priority
    }

    /// Caller-owned entry attached to an item.
    pub fn entry(&self, id: ItemId) -> &E {
        &self.pool.item(id).entry
    }

    pub fn entry_mut(&mut self, id: ItemId) -> &mut E {
        &mut self.pool.item_mut(id).entry
    }

    /// Links an item into its bucket and updates the search bookkeeping.
    /// Shared by insertion, rehashing and width re-estimation; never
    /// resizes.
    fn place(&mut self, id: ItemId) {
        let priority = self.pool.item(id).priority;
        let day = (priority / self.bucket_width).floor() as u64;
        let idx = self.n_bucket - (day % self.n_bucket as u64) as usize - 1;
        self.link_sorted(idx, id);
        self.n_item += 1;
        if priority > self.last_priority {
            self.last_idx = idx;
            self.last_priority = priority;
            self.bucket_min = (priority / self.bucket_width).floor() * self.bucket_width;
        }
    }

    /// Inserts an item into bucket `idx`, keeping the list sorted by
    /// strictly decreasing priority. Buckets hold O(1) items on average, so
    /// the scan is short.
    fn link_sorted(&mut self, idx: usize, id: ItemId) {
        let slot = self.bucket_base + idx;
        let priority = self.pool.item(id).priority;
        let mut prev = None;
        let mut cur = self.buckets[slot];
        while let Some(c) = cur {
            let item = self.pool.item(c);
            if item.priority <= priority {
                break;
            }
            prev = cur;
            cur = item.next;
        }
        {
            let item = self.pool.item_mut(id);
            item.prev = prev;
            item.next = cur;
        }
        match prev {
            Some(p) => self.pool.item_mut(p).next = Some(id),
            None => self.buckets[slot] = Some(id),
        }
        if let Some(c) = cur {
            self.pool.item_mut(c).prev = Some(id);
        }
    }

    /// Unlinks and returns the head of the bucket at backing-array `slot`.
    fn unlink_head(&mut self, slot: usize) -> Option<ItemId> {
        let head = self.buckets[slot]?;
        let next = self.pool.item(head).next;
        self.buckets[slot] = next;
        if let Some(n) = next {
            self.pool.item_mut(n).prev = None;
        }
        let item = self.pool.item_mut(head);
        item.prev = None;
        item.next = None;
        Some(head)
    }

    /// Doubles the bucket count. Any backing-array growth happens before
    /// the bucket count or width changes, so a failed allocation leaves the
    /// queue exactly as it was.
    fn grow(&mut self) -> Result<(), Error> {
        if self.state != ResizeState::Idle {
            return Ok(());
        }
        self.state = ResizeState::Resizing;
        let new_n_bucket = self.n_bucket * 2;
        if self.buckets.len() < new_n_bucket * 3 {
            let new_len = self.buckets.len() * 4;
            if let Err(err) = self.buckets.try_reserve(new_len - self.buckets.len()) {
                self.state = ResizeState::Idle;
                return Err(Error::Alloc(err));
            }
            self.buckets.resize(new_len, None);
        }
        self.rehash(true);
        self.state = ResizeState::Idle;
        Ok(())
    }

    /// Halves the bucket count. Never allocates, so it cannot fail.
    fn shrink(&mut self) {
        if self.state != ResizeState::Idle {
            return;
        }
        self.state = ResizeState::Resizing;
        self.rehash(false);
        self.state = ResizeState::Idle;
    }

    /// Rebuilds the queue with twice or half as many buckets, re-linking
    /// every item. Runs entirely in the `Resizing` state: the old window of
    /// the backing array is read while the new window is written, and the
    /// extract/insert calls made by width re-estimation cannot trigger a
    /// nested resize.
    fn rehash(&mut self, grow: bool) {
        let old_n_bucket = self.n_bucket;
        let old_base = self.bucket_base;
        // Estimation runs against the old layout; the new width takes
        // effect only once the sampled items are back in place.
        self.bucket_width = self.estimate_bucket_width();
        self.n_bucket = if grow {
            self.n_bucket * 2
        } else {
            self.n_bucket / 2
        };
        self.grow_threshold = self.n_bucket * 2;
        // Shrinking below 16 items at 32 buckets would oscillate against
        // the grow threshold, so small queues never shrink.
        self.shrink_threshold = if self.n_bucket >= 32 {
            self.n_bucket / 2
        } else {
            0
        };
        self.n_item = 0;
        self.last_idx = 0;
        self.last_priority = 0.0;
        self.bucket_min = -1.0;
        self.bucket_base = if old_base != 0 {
            0
        } else {
            self.buckets.len() - self.n_bucket
        };
        for idx in 0..self.n_bucket {
            self.buckets[self.bucket_base + idx] = None;
        }
        for idx in 0..old_n_bucket {
            let mut cur = self.buckets[old_base + idx].take();
            while let Some(id) = cur {
                cur = self.pool.item(id).next;
                self.place(id);
            }
        }
    }

    /// Picks a new bucket width matched to the live priority distribution,
    /// following Brown's sampling scheme: extract up to `MAX_SAMPLES` items,
    /// average the gaps between consecutive priorities with outliers (more
    /// than twice the crude mean) discarded, and use three times that
    /// refined mean. The sampled items are re-placed before returning, while
    /// the old width is still in effect.
    fn estimate_bucket_width(&mut self) -> f64 {
        if self.n_item < 2 {
            return 1.0;
        }
        let n_sample = if self.n_item <= 5 {
            self.n_item
        } else {
            5 + self.n_item / 10
        }
        .min(MAX_SAMPLES);
        let mut sample: ArrayVec<ItemId, MAX_SAMPLES> = ArrayVec::new();
        for _ in 0..n_sample {
            match self.unlink_max() {
                Some(id) => sample.push(id),
                None => break,
            }
        }
        let first = self.pool.item(sample[0]).priority;
        let last = self.pool.item(sample[sample.len() - 1]).priority;
        let cutoff = 2.0 * (first - last) / (sample.len() - 1) as f64;
        let mut kept = 0;
        let mut sum = 0.0;
        for pair in sample.windows(2) {
            let gap = self.pool.item(pair[0]).priority - self.pool.item(pair[1]).priority;
            if gap <= cutoff {
                kept += 1;
                sum += gap;
            }
        }
        let width = if kept > 0 {
            3.0 * sum / (kept + 1) as f64
        } else {
            1.0
        };
        for id in sample {
            self.place(id);
        }
        // All-equal samples estimate zero; the width must stay positive.
        if width > 0.0 { width } else { 1.0 }
    }

    /// Counts items reachable by walking every live bucket.
    #[cfg(test)]
    fn linked_items(&self) -> usize {
        let mut count = 0;
        for idx in 0..self.n_bucket {
            let mut cur = self.buckets[self.bucket_base + idx];
            while let Some(id) = cur {
                count += 1;
                cur = self.pool.item(id).next;
            }
        }
        count
    }
}
