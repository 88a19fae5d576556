use {
    block_pool_types::{
        BindError, BufferCreationError, BufferDevice, BufferInfo, DeviceMapError, DeviceProperties,
        MappedMemoryRange, MemoryDevice, MemoryHeap, MemoryPropertyFlags, MemoryRequirements,
        MemoryType, OutOfMemory, Sharing,
    },
    parking_lot::Mutex,
    slab::Slab,
    std::{
        borrow::Cow,
        convert::TryFrom as _,
        ptr::NonNull,
        sync::atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

struct MockMemory {
    memory_type: u32,
    size: u64,
    // Raw so that pointers handed out by `map_memory` stay valid while the
    // device lock is released.
    content: NonNull<u8>,
    len: usize,
    mapped: Option<(u64, u64)>,
    bound_buffers: usize,
}

// Content is only touched through pointers returned from `map_memory`
// or under the device lock.
unsafe impl Send for MockMemory {}

impl MockMemory {
    fn new(memory_type: u32, size: u64, len: usize) -> Self {
        let content = Box::into_raw(vec![0u8; len].into_boxed_slice()) as *mut u8;

        MockMemory {
            memory_type,
            size,
            content: unsafe { NonNull::new_unchecked(content) },
            len,
            mapped: None,
            bound_buffers: 0,
        }
    }

    unsafe fn free(self) {
        drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
            self.content.as_ptr(),
            self.len,
        )));
    }
}

#[derive(Debug)]
struct MockBuffer {
    size: u64,
    concurrent_families: usize,
    bound: Option<(usize, u64)>,
}

struct MockState {
    memories: Slab<MockMemory>,
    buffers: Slab<MockBuffer>,
    allocations_remains: u32,
    heaps_remaining_capacity: Box<[u64]>,
}

/// Host-memory backed device for tests and demos.
///
/// Validates usage rules of Vulkan like APIs with assertions,
/// including that buffers bound to one memory object never overlap.
pub struct MockMemoryDevice {
    memory_types: Box<[MemoryType]>,
    memory_heaps: Box<[MemoryHeap]>,
    max_memory_allocation_count: u32,
    max_memory_allocation_size: u64,
    non_coherent_atom_size: u64,
    buffer_alignment: u64,
    buffer_size_granularity: u64,
    memory_type_bits: u32,

    state: Mutex<MockState>,

    fail_next_allocation: AtomicBool,
    fail_next_buffer: AtomicBool,
    fail_next_bind: AtomicBool,

    device_calls: AtomicU64,
    total_allocations_counter: AtomicU64,
    total_deallocations_counter: AtomicU64,
    total_buffers_counter: AtomicU64,
    total_destroyed_buffers_counter: AtomicU64,
}

impl MockMemoryDevice {
    pub fn new(props: DeviceProperties<'_>) -> Self {
        assert!(props.memory_types.len() <= 32, "At most 32 memory types");

        MockMemoryDevice {
            memory_type_bits: (1u64 << props.memory_types.len()).wrapping_sub(1) as u32,
            state: Mutex::new(MockState {
                memories: Slab::new(),
                buffers: Slab::new(),
                allocations_remains: props.max_memory_allocation_count,
                heaps_remaining_capacity: props
                    .memory_heaps
                    .iter()
                    .map(|heap| heap.size)
                    .collect(),
            }),

            memory_types: props.memory_types.into_owned().into_boxed_slice(),
            memory_heaps: props.memory_heaps.into_owned().into_boxed_slice(),
            max_memory_allocation_count: props.max_memory_allocation_count,
            max_memory_allocation_size: props.max_memory_allocation_size,
            non_coherent_atom_size: props.non_coherent_atom_size,
            buffer_alignment: 1,
            buffer_size_granularity: 1,

            fail_next_allocation: AtomicBool::new(false),
            fail_next_buffer: AtomicBool::new(false),
            fail_next_bind: AtomicBool::new(false),

            device_calls: AtomicU64::new(0),
            total_allocations_counter: AtomicU64::new(0),
            total_deallocations_counter: AtomicU64::new(0),
            total_buffers_counter: AtomicU64::new(0),
            total_destroyed_buffers_counter: AtomicU64::new(0),
        }
    }

    /// Device with three memory types:
    /// `0` device-local on heap 0,
    /// `1` host-visible coherent and `2` host-visible cached non-coherent, both on heap 1.
    pub fn typical(heap_size: u64) -> Self {
        MockMemoryDevice::new(DeviceProperties {
            memory_types: Cow::Owned(vec![
                MemoryType {
                    heap: 0,
                    props: MemoryPropertyFlags::DEVICE_LOCAL,
                },
                MemoryType {
                    heap: 1,
                    props: MemoryPropertyFlags::HOST_VISIBLE
                        | MemoryPropertyFlags::HOST_COHERENT,
                },
                MemoryType {
                    heap: 1,
                    props: MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_CACHED,
                },
            ]),
            memory_heaps: Cow::Owned(vec![
                MemoryHeap { size: heap_size },
                MemoryHeap { size: heap_size },
            ]),
            max_memory_allocation_count: 64,
            max_memory_allocation_size: u64::max_value(),
            non_coherent_atom_size: 64,
        })
    }

    /// Alignment reported in buffer requirements.
    pub fn with_buffer_alignment(mut self, alignment: u64) -> Self {
        assert!(alignment.is_power_of_two(), "alignment must be power of two");
        self.buffer_alignment = alignment;
        self
    }

    /// Buffer requirements report size rounded up to a multiple of `granularity`.
    pub fn with_buffer_size_granularity(mut self, granularity: u64) -> Self {
        assert_ne!(granularity, 0, "granularity must not be zero");
        self.buffer_size_granularity = granularity;
        self
    }

    /// Memory type bits reported in buffer requirements.
    pub fn with_memory_type_bits(mut self, bits: u32) -> Self {
        self.memory_type_bits = bits;
        self
    }

    pub fn props(&self) -> DeviceProperties<'_> {
        DeviceProperties {
            memory_types: Cow::Borrowed(&self.memory_types),
            memory_heaps: Cow::Borrowed(&self.memory_heaps),
            max_memory_allocation_count: self.max_memory_allocation_count,
            max_memory_allocation_size: self.max_memory_allocation_size,
            non_coherent_atom_size: self.non_coherent_atom_size,
        }
    }

    /// Next `allocate_memory` fails with `OutOfDeviceMemory`.
    pub fn fail_next_allocation(&self) {
        self.fail_next_allocation.store(true, Ordering::SeqCst);
    }

    /// Next `create_buffer` fails with `InvalidDescription`.
    pub fn fail_next_buffer(&self) {
        self.fail_next_buffer.store(true, Ordering::SeqCst);
    }

    /// Next `bind_buffer_memory` fails with `OutOfDeviceMemory`.
    pub fn fail_next_bind(&self) {
        self.fail_next_bind.store(true, Ordering::SeqCst);
    }

    /// Number of calls made to this device through its traits.
    pub fn device_calls(&self) -> u64 {
        self.device_calls.load(Ordering::SeqCst)
    }

    pub fn total_allocations(&self) -> u64 {
        self.total_allocations_counter.load(Ordering::SeqCst)
    }

    pub fn total_deallocations(&self) -> u64 {
        self.total_deallocations_counter.load(Ordering::SeqCst)
    }

    pub fn total_buffers(&self) -> u64 {
        self.total_buffers_counter.load(Ordering::SeqCst)
    }

    pub fn total_destroyed_buffers(&self) -> u64 {
        self.total_destroyed_buffers_counter.load(Ordering::SeqCst)
    }

    pub fn live_memory_objects(&self) -> usize {
        self.state.lock().memories.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Returns `(memory, offset)` the buffer is bound to.
    pub fn buffer_binding(&self, buffer: usize) -> Option<(usize, u64)> {
        self.state
            .lock()
            .buffers
            .get(buffer)
            .expect("Non-existing buffer")
            .bound
    }

    /// Returns number of queue families the buffer is shared with, zero for exclusive sharing.
    pub fn buffer_sharing(&self, buffer: usize) -> usize {
        self.state
            .lock()
            .buffers
            .get(buffer)
            .expect("Non-existing buffer")
            .concurrent_families
    }

    fn call(&self) {
        self.device_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn required_size(&self, size: u64) -> u64 {
        match size % self.buffer_size_granularity {
            0 => size,
            rem => size + (self.buffer_size_granularity - rem),
        }
    }
}

impl MemoryDevice for MockMemoryDevice {
    type Memory = usize;

    #[tracing::instrument(skip(self))]
    unsafe fn allocate_memory(&self, size: u64, memory_type: u32) -> Result<usize, OutOfMemory> {
        self.call();

        assert!(
            size <= self.max_memory_allocation_size,
            "Allocation size exceeds limit"
        );

        if self.fail_next_allocation.swap(false, Ordering::SeqCst) {
            tracing::info!("Injected allocation failure");
            return Err(OutOfMemory::OutOfDeviceMemory);
        }

        let mut state = self.state.lock();

        assert!(
            state.allocations_remains > 0,
            "Allocator should not try to allocate too many objects"
        );

        let heap = self.memory_types[memory_type as usize].heap as usize;
        if state.heaps_remaining_capacity[heap] < size {
            return Err(OutOfMemory::OutOfDeviceMemory);
        }

        let len = usize::try_from(size).map_err(|_| OutOfMemory::OutOfHostMemory)?;

        state.allocations_remains -= 1;
        state.heaps_remaining_capacity[heap] -= size;

        tracing::info!("Memory object allocated");
        self.total_allocations_counter.fetch_add(1, Ordering::SeqCst);

        Ok(state
            .memories
            .insert(MockMemory::new(memory_type, size, len)))
    }

    #[tracing::instrument(skip(self))]
    unsafe fn deallocate_memory(&self, memory: usize) {
        self.call();

        let mut state = self.state.lock();
        let memory = state.memories.remove(memory);

        assert_eq!(
            memory.bound_buffers, 0,
            "Memory object freed while buffers are still bound to it"
        );

        state.allocations_remains += 1;
        let heap = self.memory_types[memory.memory_type as usize].heap as usize;
        state.heaps_remaining_capacity[heap] += memory.size;
        memory.free();

        tracing::info!("Memory object deallocated");
        self.total_deallocations_counter.fetch_add(1, Ordering::SeqCst);
    }

    #[tracing::instrument(skip(self))]
    unsafe fn map_memory(
        &self,
        memory: &mut usize,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, DeviceMapError> {
        self.call();

        let mut state = self.state.lock();
        let memory = state
            .memories
            .get_mut(*memory)
            .expect("Non-existing memory object");

        assert!(
            self.memory_types[memory.memory_type as usize]
                .props
                .contains(MemoryPropertyFlags::HOST_VISIBLE),
            "Attempt to map non-host-visible memory"
        );

        assert!(memory.mapped.is_none(), "Already mapped");

        assert!(
            offset < memory.size,
            "offset must be less than the size of memory"
        );
        assert_ne!(size, 0, "Mapping size must be greater than 0");
        assert!(
            size <= memory.size - offset,
            "size must be less than or equal to the size of the memory minus offset"
        );

        memory.mapped = Some((offset, size));

        tracing::info!("Memory object mapped");
        Ok(NonNull::new_unchecked(
            memory.content.as_ptr().add(offset as usize),
        ))
    }

    #[tracing::instrument(skip(self))]
    unsafe fn unmap_memory(&self, memory: &mut usize) {
        self.call();

        let mut state = self.state.lock();
        let memory = state
            .memories
            .get_mut(*memory)
            .expect("Non-existing memory object");
        assert!(memory.mapped.take().is_some(), "Was not mapped");
    }

    unsafe fn invalidate_memory_ranges(
        &self,
        ranges: &[MappedMemoryRange<'_, usize>],
    ) -> Result<(), OutOfMemory> {
        self.call();
        self.check_ranges(ranges);
        Ok(())
    }

    unsafe fn flush_memory_ranges(
        &self,
        ranges: &[MappedMemoryRange<'_, usize>],
    ) -> Result<(), OutOfMemory> {
        self.call();
        self.check_ranges(ranges);
        Ok(())
    }
}

impl MockMemoryDevice {
    fn check_ranges(&self, ranges: &[MappedMemoryRange<'_, usize>]) {
        let state = self.state.lock();

        for range in ranges {
            let memory = state
                .memories
                .get(*range.memory)
                .expect("Non-existing memory object");

            let (mapped_offset, mapped_size) = memory.mapped.expect("Not mapped");

            let coherent = self.memory_types[memory.memory_type as usize]
                .props
                .contains(MemoryPropertyFlags::HOST_COHERENT);

            if coherent {
                tracing::warn!("Flushing or invalidating host-coherent memory");
            }

            assert!(
                range.offset >= mapped_offset,
                "range `offset` specifies range before mapped region"
            );
            assert!(
                range.offset - mapped_offset <= mapped_size,
                "range `offset` specifies range after mapped region"
            );
            assert!(
                range.size <= mapped_size - (range.offset - mapped_offset),
                "range `size` specifies range after mapped region"
            );
            assert_eq!(
                range.offset % self.non_coherent_atom_size,
                0,
                "`offset` must be a multiple of `non_coherent_atom_size`"
            );
            assert!(
                range.size % self.non_coherent_atom_size == 0
                    || range.offset + range.size == memory.size,
                "`size` must either be a multiple of `non_coherent_atom_size`, or `offset + size` must equal the size of memory"
            );
        }
    }
}

impl BufferDevice for MockMemoryDevice {
    type Buffer = usize;

    #[tracing::instrument(skip(self))]
    unsafe fn create_buffer(&self, info: &BufferInfo<'_>) -> Result<usize, BufferCreationError> {
        self.call();

        if self.fail_next_buffer.swap(false, Ordering::SeqCst) {
            tracing::info!("Injected buffer creation failure");
            return Err(BufferCreationError::InvalidDescription);
        }

        assert_ne!(info.size, 0, "Buffer size must be greater than 0");

        let concurrent_families = match info.sharing {
            Sharing::Exclusive => 0,
            Sharing::Concurrent(families) => {
                assert!(
                    families.len() > 1,
                    "Concurrent sharing requires at least two queue families"
                );
                families.len()
            }
        };

        self.total_buffers_counter.fetch_add(1, Ordering::SeqCst);

        Ok(self.state.lock().buffers.insert(MockBuffer {
            size: info.size,
            concurrent_families,
            bound: None,
        }))
    }

    unsafe fn buffer_requirements(&self, buffer: &usize) -> MemoryRequirements {
        self.call();

        let state = self.state.lock();
        let buffer = state.buffers.get(*buffer).expect("Non-existing buffer");

        MemoryRequirements {
            size: self.required_size(buffer.size),
            alignment: self.buffer_alignment,
            memory_type_bits: self.memory_type_bits,
        }
    }

    #[tracing::instrument(skip(self))]
    unsafe fn bind_buffer_memory(
        &self,
        buffer: &usize,
        memory: &usize,
        offset: u64,
    ) -> Result<(), BindError> {
        self.call();

        if self.fail_next_bind.swap(false, Ordering::SeqCst) {
            tracing::info!("Injected bind failure");
            return Err(BindError::OutOfDeviceMemory);
        }

        let mut state = self.state.lock();
        let state = &mut *state;

        let memory_object = state
            .memories
            .get_mut(*memory)
            .expect("Non-existing memory object");

        let size = {
            let buffer = state.buffers.get(*buffer).expect("Non-existing buffer");
            assert!(buffer.bound.is_none(), "Buffer is already bound");
            self.required_size(buffer.size)
        };

        assert_eq!(
            offset % self.buffer_alignment,
            0,
            "`offset` must be a multiple of buffer alignment"
        );
        assert!(
            size <= memory_object.size && offset <= memory_object.size - size,
            "Buffer range exceeds memory object"
        );

        for (_, other) in state.buffers.iter() {
            if let Some((other_memory, other_offset)) = other.bound {
                if other_memory == *memory {
                    let other_size = self.required_size(other.size);
                    assert!(
                        offset + size <= other_offset || other_offset + other_size <= offset,
                        "Buffer overlaps another buffer bound to the same memory object"
                    );
                }
            }
        }

        memory_object.bound_buffers += 1;
        state.buffers[*buffer].bound = Some((*memory, offset));
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    unsafe fn destroy_buffer(&self, buffer: usize) {
        self.call();

        let mut state = self.state.lock();
        let buffer = state.buffers.remove(buffer);

        if let Some((memory, _)) = buffer.bound {
            let memory = state
                .memories
                .get_mut(memory)
                .expect("Buffer outlived its memory object");
            memory.bound_buffers -= 1;
        }

        tracing::info!("Buffer destroyed");
        self.total_destroyed_buffers_counter.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for MockMemoryDevice {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for memory in state.memories.drain() {
            unsafe { memory.free() }
        }
    }
}
