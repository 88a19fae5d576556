use {
    crate::gap::{fit, Gap},
    block_pool_types::MemoryPropertyFlags,
};

#[derive(Debug)]
pub(crate) struct RegionEntry<B> {
    pub id: u64,
    pub start: u64,
    pub end: u64,
    pub buffer: B,
}

/// Live host mapping of a block.
/// Offsets are in bytes from the start of the memory object.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Mapping {
    pub region: u64,
    pub offset: u64,
    pub size: u64,
}

/// Memory object of fixed capacity with regions sorted by `start`.
#[derive(Debug)]
pub(crate) struct Block<M, B> {
    pub memory: M,
    pub capacity: u64,
    pub memory_type: u32,
    pub props: MemoryPropertyFlags,
    pub mapping: Option<Mapping>,
    regions: Vec<RegionEntry<B>>,
}

impl<M, B> Block<M, B> {
    pub fn new(memory: M, capacity: u64, memory_type: u32, props: MemoryPropertyFlags) -> Self {
        Block {
            memory,
            capacity,
            memory_type,
            props,
            mapping: None,
            regions: Vec::new(),
        }
    }

    /// Walks free spans in address order and returns the first one that fits,
    /// together with the list position the new region must be inserted at.
    pub fn first_fit(&self, size: u64, alignment: u64) -> Option<(usize, Gap)> {
        let mut free_start = 0;

        for (index, region) in self.regions.iter().enumerate() {
            if let Some(gap) = fit(free_start, region.start, size, alignment) {
                return Some((index, gap));
            }
            free_start = region.end;
        }

        fit(free_start, self.capacity, size, alignment).map(|gap| (self.regions.len(), gap))
    }

    pub fn insert(&mut self, position: usize, entry: RegionEntry<B>) {
        debug_assert!(entry.start < entry.end && entry.end <= self.capacity);
        debug_assert!(
            position == 0 || self.regions[position - 1].end <= entry.start,
            "Region overlaps its predecessor"
        );
        debug_assert!(
            position == self.regions.len() || entry.end <= self.regions[position].start,
            "Region overlaps its successor"
        );

        self.regions.insert(position, entry);
    }

    /// Returns list position of the region starting at `start` if its id matches.
    pub fn find(&self, start: u64, id: u64) -> Option<usize> {
        let index = self
            .regions
            .binary_search_by_key(&start, |region| region.start)
            .ok()?;

        if self.regions[index].id == id {
            Some(index)
        } else {
            None
        }
    }

    pub fn remove(&mut self, index: usize) -> RegionEntry<B> {
        self.regions.remove(index)
    }

    pub fn drain(&mut self) -> impl Iterator<Item = RegionEntry<B>> + '_ {
        self.regions.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn used(&self) -> u64 {
        self.regions
            .iter()
            .map(|region| region.end - region.start)
            .sum()
    }

    pub fn host_visible(&self) -> bool {
        self.props.contains(MemoryPropertyFlags::HOST_VISIBLE)
    }

    pub fn coherent(&self) -> bool {
        self.props.contains(MemoryPropertyFlags::HOST_COHERENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(capacity: u64) -> Block<(), ()> {
        Block::new((), capacity, 0, MemoryPropertyFlags::DEVICE_LOCAL)
    }

    fn place(block: &mut Block<(), ()>, id: u64, size: u64, alignment: u64) -> Option<Gap> {
        let (position, gap) = block.first_fit(size, alignment)?;
        block.insert(
            position,
            RegionEntry {
                id,
                start: gap.start,
                end: gap.end,
                buffer: (),
            },
        );
        Some(gap)
    }

    fn spans(block: &Block<(), ()>) -> Vec<(u64, u64)> {
        block.regions.iter().map(|r| (r.start, r.end)).collect()
    }

    #[test]
    fn empty_block_is_one_gap() {
        let block = block(1024);
        assert_eq!(block.first_fit(1024, 64), Some((0, Gap { start: 0, end: 1024 })));
        assert_eq!(block.first_fit(1025, 1), None);
    }

    #[test]
    fn gaps_are_scanned_in_address_order() {
        let mut block = block(1024);
        assert_eq!(place(&mut block, 1, 300, 64), Some(Gap { start: 0, end: 300 }));
        assert_eq!(place(&mut block, 2, 300, 64), Some(Gap { start: 320, end: 620 }));
        assert_eq!(place(&mut block, 3, 300, 64), Some(Gap { start: 640, end: 940 }));
        assert_eq!(place(&mut block, 4, 100, 64), None);

        let index = block.find(320, 2).unwrap();
        block.remove(index);

        // Gap before the first region is too small, gap in the middle is taken.
        assert_eq!(place(&mut block, 5, 256, 64), Some(Gap { start: 320, end: 576 }));
        assert_eq!(spans(&block), [(0, 300), (320, 576), (640, 940)]);
    }

    #[test]
    fn gap_before_first_region_is_reused() {
        let mut block = block(1024);
        place(&mut block, 1, 300, 64).unwrap();
        place(&mut block, 2, 300, 64).unwrap();

        let index = block.find(0, 1).unwrap();
        block.remove(index);

        assert_eq!(place(&mut block, 3, 250, 64), Some(Gap { start: 0, end: 250 }));
        assert_eq!(spans(&block), [(0, 250), (320, 620)]);
    }

    #[test]
    fn find_checks_region_id() {
        let mut block = block(1024);
        place(&mut block, 7, 16, 16).unwrap();
        assert_eq!(block.find(0, 7), Some(0));
        assert_eq!(block.find(0, 8), None);
        assert_eq!(block.find(16, 7), None);
    }

    #[test]
    fn used_counts_reserved_spans() {
        let mut block = block(1024);
        place(&mut block, 1, 10, 1).unwrap();
        place(&mut block, 2, 20, 1).unwrap();
        assert_eq!(block.used(), 30);
        assert_eq!(block.len(), 2);
        assert_eq!(block.drain().count(), 2);
        assert!(block.is_empty());
    }
}
