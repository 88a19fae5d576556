//!
//! # Ash backend for `block-pool`
//!
//! # Usage example
//!
//! ```ignore
//! use {
//!     ash::{vk, Entry},
//!     block_pool::{BufferUsageFlags, Config, MemoryPropertyFlags, Pool},
//!     block_pool_ash::{device_properties, AshMemoryDevice},
//!     std::ffi::CStr,
//! };
//!
//! fn main() -> eyre::Result<()> {
//!     color_eyre::install()?;
//!
//!     let entry = unsafe { Entry::load() }?;
//!     let version = unsafe { entry.try_enumerate_instance_version() }?
//!         .unwrap_or(vk::API_VERSION_1_0);
//!
//!     let app_info = vk::ApplicationInfo::default()
//!         .engine_name(CStr::from_bytes_with_nul(b"BlockPool\0").unwrap())
//!         .application_name(CStr::from_bytes_with_nul(b"BlockPoolApp\0").unwrap())
//!         .api_version(version);
//!
//!     let instance = unsafe {
//!         entry.create_instance(
//!             &vk::InstanceCreateInfo::default().application_info(&app_info),
//!             None,
//!         )
//!     }?;
//!
//!     let physical_device = unsafe { instance.enumerate_physical_devices() }?[0];
//!     let props = unsafe { device_properties(&instance, version, physical_device) }?;
//!
//!     let priorities = [0f32];
//!     let queue_info = vk::DeviceQueueCreateInfo::default()
//!         .queue_family_index(0)
//!         .queue_priorities(&priorities);
//!
//!     let device = unsafe {
//!         instance.create_device(
//!             physical_device,
//!             &vk::DeviceCreateInfo::default().queue_create_infos(std::slice::from_ref(&queue_info)),
//!             None,
//!         )
//!     }?;
//!
//!     // the `ash::Device` also implements `AsRef<AshMemoryDevice>`
//!     let pool = unsafe { Pool::new(AshMemoryDevice::wrap(&device), Config::i_am_potato(), props, &[0]) };
//!
//!     let staging = pool.create_region(
//!         10,
//!         BufferUsageFlags::TRANSFER_SRC,
//!         MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
//!     )?;
//!
//!     unsafe { pool.write_bytes(&staging, 0, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]) }?;
//!
//!     pool.destroy_region(staging)?;
//!     pool.destroy();
//!
//!     Ok(())
//! }
//! ```
//!

use {
    ash::{vk, Device, Instance},
    block_pool_types::{
        BindError, BufferCreationError, BufferDevice, BufferInfo, BufferUsageFlags, DeviceMapError,
        DeviceProperties, MappedMemoryRange, MemoryDevice, MemoryHeap, MemoryPropertyFlags,
        MemoryRequirements, MemoryType, OutOfMemory, Sharing,
    },
    std::ptr::NonNull,
    tinyvec::TinyVec,
};

#[repr(transparent)]
pub struct AshMemoryDevice {
    device: Device,
}

impl AshMemoryDevice {
    pub fn wrap(device: &Device) -> &Self {
        unsafe {
            // Safe because `Self` is `repr(transparent)`
            // with only field being `Device`.
            &*(device as *const Device as *const Self)
        }
    }
}

impl AsRef<AshMemoryDevice> for Device {
    #[inline(always)]
    fn as_ref(&self) -> &AshMemoryDevice {
        AshMemoryDevice::wrap(self)
    }
}

impl AsRef<AshMemoryDevice> for AshMemoryDevice {
    #[inline(always)]
    fn as_ref(&self) -> &AshMemoryDevice {
        self
    }
}

fn out_of_memory(err: vk::Result) -> OutOfMemory {
    match err {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => OutOfMemory::OutOfDeviceMemory,
        vk::Result::ERROR_OUT_OF_HOST_MEMORY => OutOfMemory::OutOfHostMemory,
        err => panic!("Unexpected Vulkan error: `{}`", err),
    }
}

/// Codes other than out-of-memory, e.g. `ERROR_INVALID_OPAQUE_CAPTURE_ADDRESS`, become `Rejected`.
fn bind_error(err: vk::Result) -> BindError {
    match err {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => BindError::OutOfDeviceMemory,
        vk::Result::ERROR_OUT_OF_HOST_MEMORY => BindError::OutOfHostMemory,
        _ => BindError::Rejected,
    }
}

fn mapped_ranges(
    ranges: &[MappedMemoryRange<'_, vk::DeviceMemory>],
) -> TinyVec<[vk::MappedMemoryRange<'static>; 4]> {
    ranges
        .iter()
        .map(|range| {
            vk::MappedMemoryRange::default()
                .memory(*range.memory)
                .offset(range.offset)
                .size(range.size)
        })
        .collect()
}

impl MemoryDevice for AshMemoryDevice {
    type Memory = vk::DeviceMemory;

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    unsafe fn allocate_memory(
        &self,
        size: u64,
        memory_type: u32,
    ) -> Result<vk::DeviceMemory, OutOfMemory> {
        let info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(memory_type);

        match self.device.allocate_memory(&info, None) {
            Ok(memory) => Ok(memory),
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY) => Err(OutOfMemory::OutOfDeviceMemory),
            Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY) => Err(OutOfMemory::OutOfHostMemory),
            Err(vk::Result::ERROR_TOO_MANY_OBJECTS) => panic!("Too many objects"),
            Err(err) => panic!("Unexpected Vulkan error: `{}`", err),
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    unsafe fn deallocate_memory(&self, memory: vk::DeviceMemory) {
        self.device.free_memory(memory, None);
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    unsafe fn map_memory(
        &self,
        memory: &mut vk::DeviceMemory,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, DeviceMapError> {
        match self
            .device
            .map_memory(*memory, offset, size, vk::MemoryMapFlags::empty())
        {
            Ok(ptr) => NonNull::new(ptr as *mut u8).ok_or(DeviceMapError::MapFailed),
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY) => Err(DeviceMapError::OutOfDeviceMemory),
            Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY) => Err(DeviceMapError::OutOfHostMemory),
            Err(vk::Result::ERROR_MEMORY_MAP_FAILED) => Err(DeviceMapError::MapFailed),
            Err(err) => panic!("Unexpected Vulkan error: `{}`", err),
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    unsafe fn unmap_memory(&self, memory: &mut vk::DeviceMemory) {
        self.device.unmap_memory(*memory);
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    unsafe fn invalidate_memory_ranges(
        &self,
        ranges: &[MappedMemoryRange<'_, vk::DeviceMemory>],
    ) -> Result<(), OutOfMemory> {
        self.device
            .invalidate_mapped_memory_ranges(&mapped_ranges(ranges))
            .map_err(out_of_memory)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    unsafe fn flush_memory_ranges(
        &self,
        ranges: &[MappedMemoryRange<'_, vk::DeviceMemory>],
    ) -> Result<(), OutOfMemory> {
        self.device
            .flush_mapped_memory_ranges(&mapped_ranges(ranges))
            .map_err(out_of_memory)
    }
}

impl BufferDevice for AshMemoryDevice {
    type Buffer = vk::Buffer;

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    unsafe fn create_buffer(&self, info: &BufferInfo<'_>) -> Result<vk::Buffer, BufferCreationError> {
        let create_info = vk::BufferCreateInfo::default()
            .size(info.size)
            .usage(buffer_usage_to_ash(info.usage));

        let create_info = match info.sharing {
            Sharing::Exclusive => create_info.sharing_mode(vk::SharingMode::EXCLUSIVE),
            Sharing::Concurrent(families) => create_info
                .sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(families),
        };

        match self.device.create_buffer(&create_info, None) {
            Ok(buffer) => Ok(buffer),
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY) => {
                Err(BufferCreationError::OutOfDeviceMemory)
            }
            Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY) => Err(BufferCreationError::OutOfHostMemory),
            Err(_) => Err(BufferCreationError::InvalidDescription),
        }
    }

    unsafe fn buffer_requirements(&self, buffer: &vk::Buffer) -> MemoryRequirements {
        let requirements = self.device.get_buffer_memory_requirements(*buffer);

        MemoryRequirements {
            size: requirements.size,
            alignment: requirements.alignment,
            memory_type_bits: requirements.memory_type_bits,
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    unsafe fn bind_buffer_memory(
        &self,
        buffer: &vk::Buffer,
        memory: &vk::DeviceMemory,
        offset: u64,
    ) -> Result<(), BindError> {
        self.device
            .bind_buffer_memory(*buffer, *memory, offset)
            .map_err(bind_error)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    unsafe fn destroy_buffer(&self, buffer: vk::Buffer) {
        self.device.destroy_buffer(buffer, None);
    }
}

/// Returns `DeviceProperties` from ash's `Instance` for specified `PhysicalDevice`, required to create `Pool`.
///
/// On Vulkan 1.1 and later `max_memory_allocation_size` is queried from
/// `PhysicalDeviceMaintenance3Properties`, otherwise it is left unbounded.
///
/// # Safety
///
/// `physical_device` must be queried from this `instance`.
/// `version` must not exceed API version supported by `instance`.
pub unsafe fn device_properties(
    instance: &Instance,
    version: u32,
    physical_device: vk::PhysicalDevice,
) -> Result<DeviceProperties<'static>, vk::Result> {
    let (limits, max_memory_allocation_size) =
        if vk::api_version_major(version) > 1 || vk::api_version_minor(version) >= 1 {
            let mut maintenance3 = vk::PhysicalDeviceMaintenance3Properties::default();
            let mut properties = vk::PhysicalDeviceProperties2::default().push_next(&mut maintenance3);
            instance.get_physical_device_properties2(physical_device, &mut properties);
            let limits = properties.properties.limits;
            (limits, maintenance3.max_memory_allocation_size)
        } else {
            let limits = instance
                .get_physical_device_properties(physical_device)
                .limits;
            (limits, u64::max_value())
        };

    let memory_properties = instance.get_physical_device_memory_properties(physical_device);

    Ok(DeviceProperties {
        max_memory_allocation_count: limits.max_memory_allocation_count,
        max_memory_allocation_size,
        non_coherent_atom_size: limits.non_coherent_atom_size,
        memory_types: memory_properties.memory_types
            [..memory_properties.memory_type_count as usize]
            .iter()
            .map(|memory_type| MemoryType {
                props: memory_properties_from_ash(memory_type.property_flags),
                heap: memory_type.heap_index,
            })
            .collect(),
        memory_heaps: memory_properties.memory_heaps
            [..memory_properties.memory_heap_count as usize]
            .iter()
            .map(|&memory_heap| MemoryHeap {
                size: memory_heap.size,
            })
            .collect(),
    })
}

pub fn memory_properties_from_ash(props: vk::MemoryPropertyFlags) -> MemoryPropertyFlags {
    let mut result = MemoryPropertyFlags::empty();
    if props.contains(vk::MemoryPropertyFlags::DEVICE_LOCAL) {
        result |= MemoryPropertyFlags::DEVICE_LOCAL;
    }
    if props.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
        result |= MemoryPropertyFlags::HOST_VISIBLE;
    }
    if props.contains(vk::MemoryPropertyFlags::HOST_COHERENT) {
        result |= MemoryPropertyFlags::HOST_COHERENT;
    }
    if props.contains(vk::MemoryPropertyFlags::HOST_CACHED) {
        result |= MemoryPropertyFlags::HOST_CACHED;
    }
    if props.contains(vk::MemoryPropertyFlags::LAZILY_ALLOCATED) {
        result |= MemoryPropertyFlags::LAZILY_ALLOCATED;
    }
    if props.contains(vk::MemoryPropertyFlags::PROTECTED) {
        result |= MemoryPropertyFlags::PROTECTED;
    }
    result
}

pub fn memory_properties_to_ash(props: MemoryPropertyFlags) -> vk::MemoryPropertyFlags {
    let mut result = vk::MemoryPropertyFlags::empty();
    if props.contains(MemoryPropertyFlags::DEVICE_LOCAL) {
        result |= vk::MemoryPropertyFlags::DEVICE_LOCAL;
    }
    if props.contains(MemoryPropertyFlags::HOST_VISIBLE) {
        result |= vk::MemoryPropertyFlags::HOST_VISIBLE;
    }
    if props.contains(MemoryPropertyFlags::HOST_COHERENT) {
        result |= vk::MemoryPropertyFlags::HOST_COHERENT;
    }
    if props.contains(MemoryPropertyFlags::HOST_CACHED) {
        result |= vk::MemoryPropertyFlags::HOST_CACHED;
    }
    if props.contains(MemoryPropertyFlags::LAZILY_ALLOCATED) {
        result |= vk::MemoryPropertyFlags::LAZILY_ALLOCATED;
    }
    if props.contains(MemoryPropertyFlags::PROTECTED) {
        result |= vk::MemoryPropertyFlags::PROTECTED;
    }
    result
}

/// `BufferUsageFlags` bits are defined equal to their Vulkan counterparts.
pub fn buffer_usage_to_ash(usage: BufferUsageFlags) -> vk::BufferUsageFlags {
    vk::BufferUsageFlags::from_raw(usage.bits())
}
