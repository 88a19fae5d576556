use block_pool_types::MemoryPropertyFlags;

/// Buffer bound to a byte range of a pool block.
///
/// Returned by `Pool::create_region` and consumed by `Pool::destroy_region`.
/// The range `[start, end)` stays owned by the block until then.
#[derive(Debug)]
pub struct Region<B> {
    pub(crate) buffer: B,
    pub(crate) block: usize,
    pub(crate) id: u64,
    pub(crate) start: u64,
    pub(crate) end: u64,
    pub(crate) size: u64,
    pub(crate) memory_type: u32,
    pub(crate) props: MemoryPropertyFlags,
}

impl<B> Region<B> {
    /// Returns buffer handle bound to this region.
    #[inline(always)]
    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    /// Returns offset in bytes from start of the block memory object to start of this region.
    #[inline(always)]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Returns end (exclusive) of the byte range reserved for this region.
    /// May exceed `start + size` when the device requires more memory than requested.
    #[inline(always)]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Returns requested size of the buffer.
    #[inline(always)]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns index of the block in the pool.
    #[inline(always)]
    pub fn block_index(&self) -> usize {
        self.block
    }

    /// Returns index of type of parent memory object.
    #[inline(always)]
    pub fn memory_type(&self) -> u32 {
        self.memory_type
    }

    /// Returns memory property flags for parent memory object.
    #[inline(always)]
    pub fn props(&self) -> MemoryPropertyFlags {
        self.props
    }
}
