use {
    crate::region::Region,
    block_pool_types::{BufferCreationError, DeviceMapError, OutOfMemory},
    std::fmt::{self, Display},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AllocationError {
    OutOfDeviceMemory,
    OutOfHostMemory,
    NoSuitableMemoryType,
    TooManyObjects,
    BufferCreationFailed,
    BindFailed,
    RegionTooLarge,
    ZeroSized,
}

impl From<OutOfMemory> for AllocationError {
    fn from(err: OutOfMemory) -> Self {
        match err {
            OutOfMemory::OutOfDeviceMemory => AllocationError::OutOfDeviceMemory,
            OutOfMemory::OutOfHostMemory => AllocationError::OutOfHostMemory,
        }
    }
}

impl From<BufferCreationError> for AllocationError {
    fn from(_: BufferCreationError) -> Self {
        AllocationError::BufferCreationFailed
    }
}

impl Display for AllocationError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationError::OutOfDeviceMemory => fmt.write_str("Device memory exhausted"),
            AllocationError::OutOfHostMemory => fmt.write_str("Host memory exhausted"),
            AllocationError::NoSuitableMemoryType => fmt.write_str(
                "No memory type allowed by buffer requirements has requested properties",
            ),
            AllocationError::TooManyObjects => {
                fmt.write_str("Reached limit on memory objects count")
            }
            AllocationError::BufferCreationFailed => fmt.write_str("Failed to create buffer"),
            AllocationError::BindFailed => fmt.write_str("Failed to bind buffer to memory"),
            AllocationError::RegionTooLarge => {
                fmt.write_str("Requested region does not fit into a memory block")
            }
            AllocationError::ZeroSized => fmt.write_str("Zero-sized regions are not allowed"),
        }
    }
}

impl std::error::Error for AllocationError {}

/// Region handle does not refer to a live region of this pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegionNotFound;

impl Display for RegionNotFound {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("Region is not registered in this pool")
    }
}

impl std::error::Error for RegionNotFound {}

/// Returned by `Pool::destroy_region` for a handle this pool doesn't own.
/// The handle is given back untouched.
#[derive(Debug)]
pub struct UnknownRegion<B> {
    region: Region<B>,
}

impl<B> UnknownRegion<B> {
    pub(crate) fn new(region: Region<B>) -> Self {
        UnknownRegion { region }
    }

    pub fn region(&self) -> &Region<B> {
        &self.region
    }

    pub fn into_region(self) -> Region<B> {
        self.region
    }
}

impl<B> Display for UnknownRegion<B> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&RegionNotFound, fmt)
    }
}

impl<B> std::error::Error for UnknownRegion<B> where B: fmt::Debug {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MapError {
    OutOfDeviceMemory,
    OutOfHostMemory,
    NonHostVisible,
    MapFailed,
    AlreadyMapped,
    NotMapped,
    RegionNotFound,
}

impl From<DeviceMapError> for MapError {
    fn from(err: DeviceMapError) -> Self {
        match err {
            DeviceMapError::OutOfDeviceMemory => MapError::OutOfDeviceMemory,
            DeviceMapError::OutOfHostMemory => MapError::OutOfHostMemory,
            DeviceMapError::MapFailed => MapError::MapFailed,
        }
    }
}

impl From<OutOfMemory> for MapError {
    fn from(err: OutOfMemory) -> Self {
        match err {
            OutOfMemory::OutOfDeviceMemory => MapError::OutOfDeviceMemory,
            OutOfMemory::OutOfHostMemory => MapError::OutOfHostMemory,
        }
    }
}

impl From<RegionNotFound> for MapError {
    fn from(_: RegionNotFound) -> Self {
        MapError::RegionNotFound
    }
}

impl Display for MapError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::OutOfDeviceMemory => fmt.write_str("Device memory exhausted"),
            MapError::OutOfHostMemory => fmt.write_str("Host memory exhausted"),
            MapError::MapFailed => fmt.write_str("Failed to map memory object"),
            MapError::NonHostVisible => fmt.write_str("Impossible to map non-host-visible memory"),
            MapError::AlreadyMapped => fmt.write_str("Memory block is already mapped"),
            MapError::NotMapped => fmt.write_str("Region is not mapped"),
            MapError::RegionNotFound => fmt.write_str("Region is not registered in this pool"),
        }
    }
}

impl std::error::Error for MapError {}
