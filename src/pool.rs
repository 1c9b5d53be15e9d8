use crate::Error;

/// Number of item slots reserved per pool growth step.
pub(crate) const ITEM_BLOCK: usize = 1024;

/// Stable handle to an item in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(u32);

impl ItemId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A queue item: a priority, a caller-owned entry, and bucket-list links.
#[derive(Debug)]
pub(crate) struct Item<E> {
    pub(crate) priority: f64,
    pub(crate) entry: E,
    pub(crate) prev: Option<ItemId>,
    pub(crate) next: Option<ItemId>,
}

/// Slab-backed pool of queue items with free-list recycling.
///
/// Items are addressed by [`ItemId`] rather than by pointer, so a stale
/// handle can at worst read a recycled slot, never freed memory. Capacity
/// grows in fixed blocks of `ITEM_BLOCK` slots and never shrinks; a freed
/// slot keeps its entry until the slot is reused or the pool is dropped.
pub(crate) struct ItemPool<E> {
    items: Vec<Item<E>>,
    free: Vec<ItemId>,
}

impl<E> ItemPool<E> {
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Takes a slot from the free list, or carves a new one, reserving a
    /// fresh block of slots when the current block is exhausted.
    pub(crate) fn new_item(&mut self, priority: f64, entry: E) -> Result<ItemId, Error> {
        if let Some(id) = self.free.pop() {
            let item = &mut self.items[id.index()];
            item.priority = priority;
            item.entry = entry;
            item.prev = None;
            item.next = None;
            return Ok(id);
        }
        if self.items.len() == self.items.capacity() {
            self.items.try_reserve(ITEM_BLOCK)?;
        }
        let id = ItemId(self.items.len() as u32);
        self.items.push(Item {
            priority,
            entry,
            prev: None,
            next: None,
        });
        Ok(id)
    }

    /// Returns a slot to the free list. The caller must ensure the item is
    /// not linked into any bucket.
    pub(crate) fn free_item(&mut self, id: ItemId) {
        self.free.push(id);
    }

    pub(crate) fn item(&self, id: ItemId) -> &Item<E> {
        &self.items[id.index()]
    }

    pub(crate) fn item_mut(&mut self, id: ItemId) -> &mut Item<E> {
        &mut self.items[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_fields() {
        let mut pool: ItemPool<&str> = ItemPool::new();
        let id = pool.new_item(2.5, "hello").unwrap();
        let item = pool.item(id);
        assert_eq!(item.priority, 2.5);
        assert_eq!(item.entry, "hello");
        assert_eq!(item.prev, None);
        assert_eq!(item.next, None);
    }

    #[test]
    fn test_free_slot_reused() {
        let mut pool: ItemPool<u32> = ItemPool::new();
        let a = pool.new_item(1.0, 1).unwrap();
        let b = pool.new_item(2.0, 2).unwrap();
        assert_ne!(a, b);

        pool.free_item(b);
        let c = pool.new_item(3.0, 3).unwrap();
        assert_eq!(b, c);
        assert_eq!(pool.item(c).priority, 3.0);
        assert_eq!(pool.item(c).entry, 3);

        // The other slot is untouched.
        assert_eq!(pool.item(a).priority, 1.0);
        assert_eq!(pool.item(a).entry, 1);
    }

    #[test]
    fn test_reuse_clears_links() {
        let mut pool: ItemPool<()> = ItemPool::new();
        let a = pool.new_item(1.0, ()).unwrap();
        let b = pool.new_item(2.0, ()).unwrap();
        pool.item_mut(a).next = Some(b);
        pool.item_mut(a).prev = Some(b);

        pool.free_item(a);
        let c = pool.new_item(5.0, ()).unwrap();
        assert_eq!(a, c);
        assert_eq!(pool.item(c).prev, None);
        assert_eq!(pool.item(c).next, None);
    }

    #[test]
    fn test_capacity_grows_in_blocks() {
        let mut pool: ItemPool<usize> = ItemPool::new();
        for i in 0..ITEM_BLOCK {
            pool.new_item(i as f64, i).unwrap();
        }
        assert!(pool.items.capacity() >= ITEM_BLOCK);

        // Crossing the block boundary reserves another block.
        pool.new_item(0.0, 0).unwrap();
        assert!(pool.items.capacity() >= 2 * ITEM_BLOCK);
        assert_eq!(pool.items.len(), ITEM_BLOCK + 1);
    }

    #[test]
    fn test_free_does_not_shrink() {
        let mut pool: ItemPool<()> = ItemPool::new();
        let ids: Vec<ItemId> = (0..100).map(|i| pool.new_item(i as f64, ()).unwrap()).collect();
        for id in ids {
            pool.free_item(id);
        }
        assert_eq!(pool.items.len(), 100);
        assert_eq!(pool.free.len(), 100);
    }
}
