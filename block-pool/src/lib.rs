//!
//! First-fit buffer sub-allocator for Vulkan like APIs.
//!
//! Device memory objects are expensive and their count is limited,
//! so buffers are placed into a few large fixed-size blocks instead.
//!

mod block;
mod config;
mod error;
mod gap;
mod heap;
mod pool;
mod query;
mod region;

pub use {
    self::{
        config::*,
        error::*,
        gap::{fit, Gap},
        pool::*,
        query::find_memory_type,
        region::Region,
    },
    block_pool_types::*,
};

/// Aligns `value` up to `align_mask`
/// Returns smallest integer not lesser than `value` aligned by `align_mask`.
/// Returns `None` on overflow.
pub(crate) fn align_up(value: u64, align_mask: u64) -> Option<u64> {
    Some(value.checked_add(align_mask)? & !align_mask)
}

/// Align `value` down to `align_mask`
/// Returns largest integer not bigger than `value` aligned by `align_mask`.
pub(crate) fn align_down(value: u64, align_mask: u64) -> u64 {
    value & !align_mask
}
