/// Configuration for [`Pool`]
///
/// [`Pool`]: struct.Pool.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Size in bytes of every memory object allocated by the pool.
    /// Requests larger than this are rejected.
    /// Clamped to device's `max_memory_allocation_size`.
    pub block_size: u64,

    /// Return memory object to the device as soon as the last region in it is destroyed.
    /// When disabled blocks live until the pool is destroyed.
    pub release_empty_blocks: bool,
}

impl Config {
    /// Returns default configuration.
    /// This is not `Default` implementation to discourage usage outside of
    /// prototyping.
    /// Proper configuration should depend on hardware and intended usage.
    pub fn i_am_prototyping() -> Self {
        Config {
            block_size: 16 * 1024 * 1024,
            release_empty_blocks: false,
        }
    }

    /// Returns default configuration for potato.
    pub fn i_am_potato() -> Self {
        Config {
            block_size: 1024 * 1024,
            release_empty_blocks: false,
        }
    }

    /// Returns this configuration with `block_size` replaced.
    pub fn with_block_size(self, block_size: u64) -> Self {
        Config { block_size, ..self }
    }
}
