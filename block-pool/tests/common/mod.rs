#![allow(dead_code)]

use {
    block_pool::{Config, Pool, Region},
    block_pool_mock::MockMemoryDevice,
    std::collections::BTreeMap,
};

pub const HEAP_SIZE: u64 = 64 * 1024 * 1024;

pub fn device(alignment: u64) -> MockMemoryDevice {
    MockMemoryDevice::typical(HEAP_SIZE).with_buffer_alignment(alignment)
}

pub fn pool(device: &MockMemoryDevice, block_size: u64) -> Pool<&MockMemoryDevice> {
    pool_with(device, Config::i_am_potato().with_block_size(block_size))
}

pub fn pool_with(device: &MockMemoryDevice, config: Config) -> Pool<&MockMemoryDevice> {
    unsafe { Pool::new(device, config, device.props(), &[]) }
}

pub fn span(region: &Region<usize>) -> (u64, u64) {
    (region.start(), region.end())
}

/// Checks ordering, non-overlap, alignment and capacity of live regions.
pub fn assert_layout(regions: &[Region<usize>], block_size: u64, alignment: u64) {
    let mut by_block: BTreeMap<usize, Vec<(u64, u64)>> = BTreeMap::new();

    for region in regions {
        assert!(region.start() < region.end(), "empty region {:?}", region);
        assert!(region.end() <= block_size, "region past block end {:?}", region);
        assert_eq!(region.start() % alignment, 0, "misaligned region {:?}", region);
        assert_eq!(region.end() - region.start(), region.size());

        by_block
            .entry(region.block_index())
            .or_default()
            .push(span(region));
    }

    for spans in by_block.values_mut() {
        spans.sort_unstable();
        for pair in spans.windows(2) {
            assert!(
                pair[0].1 <= pair[1].0,
                "regions {:?} and {:?} overlap",
                pair[0],
                pair[1]
            );
        }
    }
}
