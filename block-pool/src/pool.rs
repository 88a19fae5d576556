use {
    crate::{
        align_down, align_up,
        block::{Block, Mapping, RegionEntry},
        config::Config,
        error::{AllocationError, MapError, RegionNotFound, UnknownRegion},
        gap::Gap,
        heap::Heap,
        query::find_memory_type,
        region::Region,
    },
    block_pool_types::{
        BufferDevice, BufferInfo, BufferUsageFlags, DeviceProperties, MappedMemoryRange,
        MemoryPropertyFlags, MemoryType, Sharing,
    },
    parking_lot::Mutex,
    std::{
        convert::TryFrom as _,
        ptr::{copy_nonoverlapping, NonNull},
        sync::atomic::{AtomicU64, Ordering},
    },
};

/// Snapshot of pool occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PoolStats {
    /// Number of live memory blocks.
    pub blocks: usize,

    /// Number of live regions across all blocks.
    pub regions: usize,

    /// Bytes of device memory held by live blocks.
    pub block_bytes: u64,

    /// Bytes reserved by live regions, alignment padding excluded.
    pub used_bytes: u64,
}

struct Budget {
    heaps: Box<[Heap]>,
    allocations_remains: u32,
}

struct State<M, B> {
    // Released blocks leave `None` behind until the next new block takes the slot.
    // Stale handles are still rejected by the region id check.
    blocks: Vec<Option<Block<M, B>>>,
    budget: Budget,
}

// Shared by all pools so a handle from one pool never matches a region of another.
static NEXT_REGION_ID: AtomicU64 = AtomicU64::new(0);

/// Sub-allocates buffers from fixed-size device memory blocks.
///
/// Every operation takes the pool lock for its whole duration,
/// device calls included.
pub struct Pool<D: BufferDevice> {
    device: D,
    block_size: u64,
    release_empty_blocks: bool,
    non_coherent_atom_mask: u64,
    memory_types: Box<[MemoryType]>,
    queue_families: Box<[u32]>,
    state: Mutex<State<D::Memory, D::Buffer>>,
}

impl<D> Pool<D>
where
    D: BufferDevice,
{
    /// Creates new pool serving buffers from `device`.
    /// Buffers are shared concurrently among `queue_families`
    /// when it lists two or more distinct families.
    ///
    /// # Safety
    ///
    /// Provided `DeviceProperties` must match properties of `device`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(device)))]
    pub unsafe fn new(
        device: D,
        config: Config,
        props: DeviceProperties<'_>,
        queue_families: &[u32],
    ) -> Self {
        assert_ne!(config.block_size, 0, "`block_size` must not be zero");

        assert!(
            props.non_coherent_atom_size.is_power_of_two(),
            "`non_coherent_atom_size` must be power of two"
        );

        assert!(
            isize::try_from(props.non_coherent_atom_size).is_ok(),
            "`non_coherent_atom_size` must fit host address space"
        );

        assert!(
            props
                .memory_types
                .iter()
                .all(|memory_type| (memory_type.heap as usize) < props.memory_heaps.len()),
            "Memory type refers to non-existing heap"
        );

        let block_size = config.block_size.min(props.max_memory_allocation_size);

        #[cfg(feature = "tracing")]
        if block_size < config.block_size {
            tracing::warn!(
                "Block size {} is clamped to device limit {}",
                config.block_size,
                block_size
            );
        }

        let mut queue_families = queue_families.to_vec();
        queue_families.sort_unstable();
        queue_families.dedup();

        Pool {
            device,
            block_size,
            release_empty_blocks: config.release_empty_blocks,
            non_coherent_atom_mask: props.non_coherent_atom_size - 1,
            memory_types: props.memory_types.iter().copied().collect(),
            queue_families: queue_families.into_boxed_slice(),
            state: Mutex::new(State {
                blocks: Vec::new(),
                budget: Budget {
                    heaps: props
                        .memory_heaps
                        .iter()
                        .map(|heap| Heap::new(heap.size))
                        .collect(),
                    allocations_remains: props.max_memory_allocation_count,
                },
            }),
        }
    }

    /// Returns capacity of every block.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Returns device used by this pool.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Creates buffer of `size` bytes and binds it to the first free range
    /// of a block with memory type that has `props`.
    /// Allocates new block if none has enough room.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn create_region(
        &self,
        size: u64,
        usage: BufferUsageFlags,
        props: MemoryPropertyFlags,
    ) -> Result<Region<D::Buffer>, AllocationError> {
        if size == 0 {
            return Err(AllocationError::ZeroSized);
        }

        if size > self.block_size {
            #[cfg(feature = "tracing")]
            tracing::error!(
                "Region of {} bytes exceeds block size {}",
                size,
                self.block_size
            );

            return Err(AllocationError::RegionTooLarge);
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;

        let sharing = if self.queue_families.len() > 1 {
            Sharing::Concurrent(&self.queue_families)
        } else {
            Sharing::Exclusive
        };

        let buffer = unsafe {
            self.device.create_buffer(&BufferInfo {
                size,
                usage,
                sharing,
            })
        }
        .map_err(|_err| {
            #[cfg(feature = "tracing")]
            tracing::error!("Failed to create buffer: {:?}", _err);

            AllocationError::BufferCreationFailed
        })?;

        match self.place(state, &buffer, size, props) {
            Ok((block, entry)) => Ok(Region {
                buffer,
                block,
                id: entry.id,
                start: entry.start,
                end: entry.end,
                size,
                memory_type: entry.memory_type,
                props: entry.props,
            }),
            Err(err) => {
                unsafe { self.device.destroy_buffer(buffer) }
                Err(err)
            }
        }
    }

    /// Finds room for `buffer`, binds it and registers the region.
    /// Nothing is registered unless binding succeeds.
    fn place(
        &self,
        state: &mut State<D::Memory, D::Buffer>,
        buffer: &D::Buffer,
        size: u64,
        props: MemoryPropertyFlags,
    ) -> Result<(usize, Placed), AllocationError> {
        let requirements = unsafe { self.device.buffer_requirements(buffer) };
        let reserved = requirements.size.max(size);

        if reserved > self.block_size {
            #[cfg(feature = "tracing")]
            tracing::error!(
                "Buffer requires {} bytes which exceeds block size {}",
                reserved,
                self.block_size
            );

            return Err(AllocationError::RegionTooLarge);
        }

        let memory_type =
            find_memory_type(&self.memory_types, requirements.memory_type_bits, props)?;

        let found = state
            .blocks
            .iter_mut()
            .enumerate()
            .find_map(|(index, slot)| match slot {
                Some(block) if block.memory_type == memory_type => block
                    .first_fit(reserved, requirements.alignment)
                    .map(|(position, gap)| (index, block, position, gap)),
                _ => None,
            });

        let (index, id, gap) = match found {
            Some((index, block, position, gap)) => {
                unsafe { self.bind(buffer, block, gap) }?;
                let id = NEXT_REGION_ID.fetch_add(1, Ordering::Relaxed);

                block.insert(
                    position,
                    RegionEntry {
                        id,
                        start: gap.start,
                        end: gap.end,
                        buffer: buffer.clone(),
                    },
                );

                (index, id, gap)
            }
            None => {
                let mut block = self.allocate_block(&mut state.budget, memory_type)?;
                let gap = Gap {
                    start: 0,
                    end: reserved,
                };

                if let Err(err) = unsafe { self.bind(buffer, &block, gap) } {
                    unsafe { free_block(&self.device, &mut state.budget, &self.memory_types, block) };
                    return Err(err);
                }

                let id = NEXT_REGION_ID.fetch_add(1, Ordering::Relaxed);
                block.insert(
                    0,
                    RegionEntry {
                        id,
                        start: gap.start,
                        end: gap.end,
                        buffer: buffer.clone(),
                    },
                );

                let index = match state.blocks.iter().position(Option::is_none) {
                    Some(index) => {
                        state.blocks[index] = Some(block);
                        index
                    }
                    None => {
                        state.blocks.push(Some(block));
                        state.blocks.len() - 1
                    }
                };

                (index, id, gap)
            }
        };

        Ok((
            index,
            Placed {
                id,
                start: gap.start,
                end: gap.end,
                memory_type,
                props: self.memory_types[memory_type as usize].props,
            },
        ))
    }

    unsafe fn bind(
        &self,
        buffer: &D::Buffer,
        block: &Block<D::Memory, D::Buffer>,
        gap: Gap,
    ) -> Result<(), AllocationError> {
        self.device
            .bind_buffer_memory(buffer, &block.memory, gap.start)
            .map_err(|_err| {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to bind buffer at offset {}: {:?}", gap.start, _err);

                AllocationError::BindFailed
            })
    }

    fn allocate_block(
        &self,
        budget: &mut Budget,
        memory_type: u32,
    ) -> Result<Block<D::Memory, D::Buffer>, AllocationError> {
        if budget.allocations_remains == 0 {
            #[cfg(feature = "tracing")]
            tracing::error!("Reached limit on memory objects count");

            return Err(AllocationError::TooManyObjects);
        }

        let props = self.memory_types[memory_type as usize].props;
        let heap = &mut budget.heaps[self.memory_types[memory_type as usize].heap as usize];

        if heap.budget() < self.block_size {
            #[cfg(feature = "tracing")]
            tracing::error!(
                "Heap budget {} can't hold another block of {} bytes",
                heap.budget(),
                self.block_size
            );

            return Err(AllocationError::OutOfDeviceMemory);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Allocating memory object `{}@{}`",
            self.block_size,
            memory_type
        );

        let memory = unsafe { self.device.allocate_memory(self.block_size, memory_type) }?;

        budget.allocations_remains -= 1;
        heap.alloc(self.block_size);

        Ok(Block::new(memory, self.block_size, memory_type, props))
    }

    /// Unbinds and destroys the region's buffer and returns its range to the block.
    /// A handle this pool doesn't own is returned inside the error.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self, region), fields(block = region.block, start = region.start))
    )]
    pub fn destroy_region(
        &self,
        region: Region<D::Buffer>,
    ) -> Result<(), UnknownRegion<D::Buffer>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let (block, index) = match find_entry(&mut state.blocks, &region) {
            Some(found) => found,
            None => return Err(UnknownRegion::new(region)),
        };

        if let Some(mapping) = block.mapping {
            if mapping.region == region.id {
                #[cfg(feature = "tracing")]
                tracing::warn!("Destroying region that is still mapped");

                unsafe { self.device.unmap_memory(&mut block.memory) }
                block.mapping = None;
            }
        }

        let entry = block.remove(index);
        unsafe { self.device.destroy_buffer(entry.buffer) }

        if self.release_empty_blocks && block.is_empty() {
            if let Some(block) = state.blocks[region.block].take() {
                #[cfg(feature = "tracing")]
                tracing::debug!("Releasing empty block {}", region.block);

                unsafe { free_block(&self.device, &mut state.budget, &self.memory_types, block) };
            }
        }

        Ok(())
    }

    /// Maps region memory and returns pointer to its first byte.
    /// Pointer stays valid for `region.size()` bytes until `unmap_region`.
    ///
    /// Only one region per block can be mapped at a time,
    /// mapping another region of the same block fails with `MapError::AlreadyMapped`.
    ///
    /// The user of returned pointer must guarantee that any previously submitted command that writes to this range has completed
    /// before the host reads from or writes to that range,
    /// and that any previously submitted command that reads from that range has completed
    /// before the host writes to that region.
    /// Writes to memory without `HOST_COHERENT` property must be followed by `flush_region`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self, region), fields(block = region.block, start = region.start))
    )]
    pub fn map_region(&self, region: &Region<D::Buffer>) -> Result<NonNull<u8>, MapError> {
        let mut guard = self.state.lock();
        let block = lookup(&mut guard.blocks, region)?;
        let ptr = unsafe { self.map_block(block, region) }?;
        Ok(ptr)
    }

    /// Unmaps region previously mapped with `map_region`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self, region), fields(block = region.block, start = region.start))
    )]
    pub fn unmap_region(&self, region: &Region<D::Buffer>) -> Result<(), MapError> {
        let mut guard = self.state.lock();
        let block = lookup(&mut guard.blocks, region)?;
        mapping_of(block, region)?;

        unsafe { self.device.unmap_memory(&mut block.memory) }
        block.mapping = None;
        Ok(())
    }

    /// Makes host writes through mapped pointer of `region` visible to the device.
    /// No-op for `HOST_COHERENT` memory.
    pub fn flush_region(&self, region: &Region<D::Buffer>) -> Result<(), MapError> {
        let mut guard = self.state.lock();
        let block = lookup(&mut guard.blocks, region)?;
        let mapping = mapping_of(block, region)?;

        if block.coherent() {
            return Ok(());
        }

        unsafe {
            self.device.flush_memory_ranges(&[MappedMemoryRange {
                memory: &block.memory,
                offset: mapping.offset,
                size: mapping.size,
            }])
        }?;
        Ok(())
    }

    /// Makes device writes visible through mapped pointer of `region`.
    /// No-op for `HOST_COHERENT` memory.
    pub fn invalidate_region(&self, region: &Region<D::Buffer>) -> Result<(), MapError> {
        let mut guard = self.state.lock();
        let block = lookup(&mut guard.blocks, region)?;
        let mapping = mapping_of(block, region)?;

        if block.coherent() {
            return Ok(());
        }

        unsafe {
            self.device.invalidate_memory_ranges(&[MappedMemoryRange {
                memory: &block.memory,
                offset: mapping.offset,
                size: mapping.size,
            }])
        }?;
        Ok(())
    }

    /// Transiently maps region memory and copies specified data
    /// to the mapped memory range.
    ///
    /// # Panics
    ///
    /// This function panics if `offset + data.len()` exceeds region size.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that any previously submitted command that reads or writes to this range has completed.
    pub unsafe fn write_bytes(
        &self,
        region: &Region<D::Buffer>,
        offset: u64,
        data: &[u8],
    ) -> Result<(), MapError> {
        assert_in_bounds(region, offset, data.len());

        let mut guard = self.state.lock();
        let block = lookup(&mut guard.blocks, region)?;
        let ptr = self.map_block(block, region)?;

        copy_nonoverlapping(data.as_ptr(), ptr.as_ptr().add(offset as usize), data.len());

        let result = match block.mapping {
            Some(mapping) if !block.coherent() => {
                self.device.flush_memory_ranges(&[MappedMemoryRange {
                    memory: &block.memory,
                    offset: mapping.offset,
                    size: mapping.size,
                }])
            }
            _ => Ok(()),
        };

        self.device.unmap_memory(&mut block.memory);
        block.mapping = None;
        result.map_err(Into::into)
    }

    /// Transiently maps region memory and copies specified data
    /// from the mapped memory range.
    ///
    /// # Panics
    ///
    /// This function panics if `offset + data.len()` exceeds region size.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that any previously submitted command that writes to this range has completed.
    pub unsafe fn read_bytes(
        &self,
        region: &Region<D::Buffer>,
        offset: u64,
        data: &mut [u8],
    ) -> Result<(), MapError> {
        assert_in_bounds(region, offset, data.len());

        #[cfg(feature = "tracing")]
        if !region.props.contains(MemoryPropertyFlags::HOST_CACHED) {
            tracing::warn!("Reading from non-cached memory may be slow. Consider allocating HOST_CACHED memory for host reads.")
        }

        let mut guard = self.state.lock();
        let block = lookup(&mut guard.blocks, region)?;
        let ptr = self.map_block(block, region)?;

        let result = match block.mapping {
            Some(mapping) if !block.coherent() => {
                self.device.invalidate_memory_ranges(&[MappedMemoryRange {
                    memory: &block.memory,
                    offset: mapping.offset,
                    size: mapping.size,
                }])
            }
            _ => Ok(()),
        };

        if result.is_ok() {
            copy_nonoverlapping(
                ptr.as_ptr().add(offset as usize),
                data.as_mut_ptr(),
                data.len(),
            );
        }

        self.device.unmap_memory(&mut block.memory);
        block.mapping = None;
        result.map_err(Into::into)
    }

    /// Maps `[start, start + size)` of the region.
    /// Non-coherent memory gets the range widened to `non_coherent_atom_size`
    /// so it can be flushed and invalidated whole.
    unsafe fn map_block(
        &self,
        block: &mut Block<D::Memory, D::Buffer>,
        region: &Region<D::Buffer>,
    ) -> Result<NonNull<u8>, MapError> {
        if !block.host_visible() {
            return Err(MapError::NonHostVisible);
        }

        if block.mapping.is_some() {
            return Err(MapError::AlreadyMapped);
        }

        let (offset, size) = if block.coherent() {
            (region.start, region.size)
        } else {
            let offset = align_down(region.start, self.non_coherent_atom_mask);
            let end = align_up(region.start + region.size, self.non_coherent_atom_mask)
                .map_or(block.capacity, |end| end.min(block.capacity));
            (offset, end - offset)
        };

        let ptr = self.device.map_memory(&mut block.memory, offset, size)?;

        block.mapping = Some(Mapping {
            region: region.id,
            offset,
            size,
        });

        let shift = (region.start - offset) as usize;
        Ok(NonNull::new_unchecked(ptr.as_ptr().add(shift)))
    }

    /// Returns occupancy snapshot.
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();

        state
            .blocks
            .iter()
            .flatten()
            .fold(PoolStats::default(), |stats, block| PoolStats {
                blocks: stats.blocks + 1,
                regions: stats.regions + block.len(),
                block_bytes: stats.block_bytes + block.capacity,
                used_bytes: stats.used_bytes + block.used(),
            })
    }

    /// Destroys every remaining region and frees every block.
    /// Returns the device.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn destroy(self) -> D {
        let Pool {
            device,
            memory_types,
            state,
            ..
        } = self;

        let mut state = state.into_inner();
        let State { blocks, budget } = &mut state;

        for block in blocks.drain(..).flatten() {
            unsafe { free_block(&device, budget, &memory_types, block) };
        }

        device
    }
}

/// Identity of a freshly registered region.
struct Placed {
    id: u64,
    start: u64,
    end: u64,
    memory_type: u32,
    props: MemoryPropertyFlags,
}

fn find_entry<'a, M, B>(
    blocks: &'a mut [Option<Block<M, B>>],
    region: &Region<B>,
) -> Option<(&'a mut Block<M, B>, usize)> {
    let block = blocks.get_mut(region.block)?.as_mut()?;
    let index = block.find(region.start, region.id)?;
    Some((block, index))
}

fn lookup<'a, M, B>(
    blocks: &'a mut [Option<Block<M, B>>],
    region: &Region<B>,
) -> Result<&'a mut Block<M, B>, RegionNotFound> {
    find_entry(blocks, region)
        .map(|(block, _)| block)
        .ok_or(RegionNotFound)
}

fn mapping_of<M, B>(block: &Block<M, B>, region: &Region<B>) -> Result<Mapping, MapError> {
    match block.mapping {
        Some(mapping) if mapping.region == region.id => Ok(mapping),
        _ => Err(MapError::NotMapped),
    }
}

fn assert_in_bounds<B>(region: &Region<B>, offset: u64, len: usize) {
    let len = u64::try_from(len).expect("`len` doesn't fit device address space");
    assert!(offset <= region.size, "`offset` is out of region bounds");
    assert!(
        len <= region.size - offset,
        "`offset + len` is out of region bounds"
    );
}

/// Destroys buffers still registered in `block` and frees its memory.
unsafe fn free_block<D>(
    device: &D,
    budget: &mut Budget,
    memory_types: &[MemoryType],
    mut block: Block<D::Memory, D::Buffer>,
) where
    D: BufferDevice,
{
    if block.mapping.take().is_some() {
        device.unmap_memory(&mut block.memory);
    }

    #[cfg(feature = "tracing")]
    if !block.is_empty() {
        tracing::warn!(
            "Force-destroying {} regions of memory type {}",
            block.len(),
            block.memory_type
        );
    }

    for entry in block.drain() {
        device.destroy_buffer(entry.buffer);
    }

    device.deallocate_memory(block.memory);
    budget.allocations_remains += 1;
    budget.heaps[memory_types[block.memory_type as usize].heap as usize].dealloc(block.capacity);
}
