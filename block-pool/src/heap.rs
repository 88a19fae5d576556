/// Tracks how much of a device heap is taken by blocks of this pool.
#[derive(Debug)]
pub(crate) struct Heap {
    size: u64,
    used: u64,
}

impl Heap {
    pub(crate) fn new(size: u64) -> Self {
        Heap { size, used: 0 }
    }

    pub(crate) fn budget(&self) -> u64 {
        self.size - self.used
    }

    pub(crate) fn alloc(&mut self, size: u64) {
        self.used += size;
    }

    pub(crate) fn dealloc(&mut self, size: u64) {
        self.used -= size;
    }
}
