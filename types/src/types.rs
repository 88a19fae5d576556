bitflags::bitflags! {
    /// Memory properties type.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct MemoryPropertyFlags: u8 {
        /// This flag is set for device-local memory types.
        /// Device-local memory is situated "close" to the GPU cores
        /// and allows for fast access.
        const DEVICE_LOCAL = 0x01;

        /// This flag is set for host-visible memory types.
        /// Host-visible memory can be mapped to the host memory range.
        const HOST_VISIBLE = 0x02;

        /// This flag is set for host-coherent memory types.
        /// Host-coherent memory does not require manual invalidation for
        /// modifications on GPU to become visible on host;
        /// nor flush for modification on host to become visible on GPU.
        /// Access synchronization is still required.
        const HOST_COHERENT = 0x04;

        /// This flag is set for host-cached memory types.
        /// Host-cached memory uses cache in host memory for faster reads from host.
        const HOST_CACHED = 0x08;

        /// This flag is set for lazily-allocated memory types.
        /// Lazily-allocated memory must be used (and only) for transient image attachments.
        const LAZILY_ALLOCATED = 0x10;

        /// This flag is set for protected memory types.
        /// Protected memory can be used for writing by protected operations
        /// and can be read only by protected operations.
        const PROTECTED = 0x20;
    }
}

bitflags::bitflags! {
    /// Intended usage of a buffer object.
    /// Bit values match their Vulkan counterparts.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct BufferUsageFlags: u32 {
        const TRANSFER_SRC = 0x001;
        const TRANSFER_DST = 0x002;
        const UNIFORM_TEXEL = 0x004;
        const STORAGE_TEXEL = 0x008;
        const UNIFORM = 0x010;
        const STORAGE = 0x020;
        const INDEX = 0x040;
        const VERTEX = 0x080;
        const INDIRECT = 0x100;
    }
}

/// Defines memory type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryType {
    /// Heap index of the memory type.
    pub heap: u32,

    /// Property flags of the memory type.
    pub props: MemoryPropertyFlags,
}

/// Defines memory heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryHeap {
    /// Size of memory heap in bytes.
    pub size: u64,
}

/// Memory requirements of a buffer object as reported by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemoryRequirements {
    /// Number of bytes the buffer needs bound.
    pub size: u64,

    /// Required alignment of the bind offset. Always a power of two.
    pub alignment: u64,

    /// Bitset of memory type indices the buffer may be bound to.
    pub memory_type_bits: u32,
}

/// How a buffer is shared between queue families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sharing<'a> {
    /// Owned by one queue family at a time.
    Exclusive,

    /// Accessed concurrently by the listed queue families.
    Concurrent(&'a [u32]),
}

/// Description of a buffer object to create.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferInfo<'a> {
    pub size: u64,
    pub usage: BufferUsageFlags,
    pub sharing: Sharing<'a>,
}
