use {
    crate::types::{BufferInfo, MemoryHeap, MemoryRequirements, MemoryType},
    alloc::borrow::Cow,
    core::ptr::NonNull,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutOfMemory {
    OutOfDeviceMemory,
    OutOfHostMemory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceMapError {
    OutOfDeviceMemory,
    OutOfHostMemory,
    MapFailed,
}

/// Device rejected buffer description.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferCreationError {
    OutOfDeviceMemory,
    OutOfHostMemory,
    InvalidDescription,
}

/// Device failed to bind buffer to memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindError {
    OutOfDeviceMemory,
    OutOfHostMemory,
    /// Any other failure reported by the device.
    Rejected,
}

#[derive(Debug)]
pub struct MappedMemoryRange<'a, M> {
    pub memory: &'a M,
    pub offset: u64,
    pub size: u64,
}

/// Properties of the device that will be used for allocating memory objects.
#[derive(Clone, Debug)]
pub struct DeviceProperties<'a> {
    /// Array of memory types provided by the device.
    pub memory_types: Cow<'a, [MemoryType]>,

    /// Array of memory heaps provided by the device.
    pub memory_heaps: Cow<'a, [MemoryHeap]>,

    /// Maximum number of valid memory allocations that can exist simultaneously within the device.
    pub max_memory_allocation_count: u32,

    /// Maximum size for single allocation supported by the device.
    pub max_memory_allocation_size: u64,

    /// Atom size for host mappable non-coherent memory.
    pub non_coherent_atom_size: u64,
}

/// Abstract device that allocates memory objects to sub-allocate.
pub trait MemoryDevice {
    /// Memory object served by this device.
    type Memory;

    /// Allocate new memory object from device.
    /// This function may be expensive and even limit maximum number of memory
    /// objects allocated.
    /// Which is the reason for sub-allocation this crate provides.
    ///
    /// # Safety
    ///
    /// `memory_type` must be valid index for memory type associated with this device.
    unsafe fn allocate_memory(
        &self,
        size: u64,
        memory_type: u32,
    ) -> Result<Self::Memory, OutOfMemory>;

    /// Deallocate memory object.
    ///
    /// # Safety
    ///
    /// Memory object must have been allocated from this device
    /// and must have no buffers bound to it anymore.
    unsafe fn deallocate_memory(&self, memory: Self::Memory);

    /// Map region of device memory to host memory space.
    ///
    /// # Safety
    ///
    /// * Memory object must have been allocated from this device.
    /// * Memory object must not be already mapped.
    /// * Memory must be allocated from type with `HOST_VISIBLE` property.
    /// * `offset + size` must not be larger than memory object size.
    unsafe fn map_memory(
        &self,
        memory: &mut Self::Memory,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, DeviceMapError>;

    /// Unmap previously mapped memory region.
    ///
    /// # Safety
    ///
    /// * Memory object must have been allocated from this device.
    /// * Memory object must be mapped.
    unsafe fn unmap_memory(&self, memory: &mut Self::Memory);

    /// Invalidates ranges of memory mapped regions.
    ///
    /// # Safety
    ///
    /// * Memory objects must have been allocated from this device.
    /// * `offset` and `size` in each element of `ranges` must specify
    ///   subregion of currently mapped memory region
    /// * if `memory` in some element of `ranges` does not contain `HOST_COHERENT` property
    ///   then `offset` and `size` of that element must be multiple of `non_coherent_atom_size`.
    unsafe fn invalidate_memory_ranges(
        &self,
        ranges: &[MappedMemoryRange<'_, Self::Memory>],
    ) -> Result<(), OutOfMemory>;

    /// Flushes ranges of memory mapped regions.
    ///
    /// # Safety
    ///
    /// Same requirements as for `invalidate_memory_ranges`.
    unsafe fn flush_memory_ranges(
        &self,
        ranges: &[MappedMemoryRange<'_, Self::Memory>],
    ) -> Result<(), OutOfMemory>;
}

/// Device able to create buffer objects and bind them to its memory objects.
pub trait BufferDevice: MemoryDevice {
    /// Opaque buffer handle. Clones refer to the same buffer object.
    type Buffer: Clone;

    /// Creates unbound buffer object.
    ///
    /// # Safety
    ///
    /// Queue family indices in `info.sharing` must be valid for this device.
    unsafe fn create_buffer(&self, info: &BufferInfo<'_>)
        -> Result<Self::Buffer, BufferCreationError>;

    /// Returns memory requirements of the buffer.
    ///
    /// # Safety
    ///
    /// Buffer must have been created from this device.
    unsafe fn buffer_requirements(&self, buffer: &Self::Buffer) -> MemoryRequirements;

    /// Binds buffer to memory object at `offset`.
    ///
    /// # Safety
    ///
    /// * Buffer and memory must have been created from this device.
    /// * Buffer must not be bound yet.
    /// * `offset` must satisfy the buffer's alignment and the bound range must fit the memory.
    unsafe fn bind_buffer_memory(
        &self,
        buffer: &Self::Buffer,
        memory: &Self::Memory,
        offset: u64,
    ) -> Result<(), BindError>;

    /// Destroys buffer object.
    /// All clones of the handle become invalid.
    ///
    /// # Safety
    ///
    /// Buffer must have been created from this device and must not be in use by the device.
    unsafe fn destroy_buffer(&self, buffer: Self::Buffer);
}

impl<T> MemoryDevice for &T
where
    T: MemoryDevice + ?Sized,
{
    type Memory = T::Memory;

    #[inline(always)]
    unsafe fn allocate_memory(
        &self,
        size: u64,
        memory_type: u32,
    ) -> Result<Self::Memory, OutOfMemory> {
        (**self).allocate_memory(size, memory_type)
    }

    #[inline(always)]
    unsafe fn deallocate_memory(&self, memory: Self::Memory) {
        (**self).deallocate_memory(memory)
    }

    #[inline(always)]
    unsafe fn map_memory(
        &self,
        memory: &mut Self::Memory,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, DeviceMapError> {
        (**self).map_memory(memory, offset, size)
    }

    #[inline(always)]
    unsafe fn unmap_memory(&self, memory: &mut Self::Memory) {
        (**self).unmap_memory(memory)
    }

    #[inline(always)]
    unsafe fn invalidate_memory_ranges(
        &self,
        ranges: &[MappedMemoryRange<'_, Self::Memory>],
    ) -> Result<(), OutOfMemory> {
        (**self).invalidate_memory_ranges(ranges)
    }

    #[inline(always)]
    unsafe fn flush_memory_ranges(
        &self,
        ranges: &[MappedMemoryRange<'_, Self::Memory>],
    ) -> Result<(), OutOfMemory> {
        (**self).flush_memory_ranges(ranges)
    }
}

impl<T> BufferDevice for &T
where
    T: BufferDevice + ?Sized,
{
    type Buffer = T::Buffer;

    #[inline(always)]
    unsafe fn create_buffer(
        &self,
        info: &BufferInfo<'_>,
    ) -> Result<Self::Buffer, BufferCreationError> {
        (**self).create_buffer(info)
    }

    #[inline(always)]
    unsafe fn buffer_requirements(&self, buffer: &Self::Buffer) -> MemoryRequirements {
        (**self).buffer_requirements(buffer)
    }

    #[inline(always)]
    unsafe fn bind_buffer_memory(
        &self,
        buffer: &Self::Buffer,
        memory: &Self::Memory,
        offset: u64,
    ) -> Result<(), BindError> {
        (**self).bind_buffer_memory(buffer, memory, offset)
    }

    #[inline(always)]
    unsafe fn destroy_buffer(&self, buffer: Self::Buffer) {
        (**self).destroy_buffer(buffer)
    }
}
