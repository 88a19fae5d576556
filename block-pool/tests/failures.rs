mod common;

use {
    block_pool::{
        AllocationError, BufferUsageFlags, Config, DeviceProperties, MemoryHeap,
        MemoryPropertyFlags, MemoryType, PoolStats, RegionNotFound,
    },
    block_pool_mock::MockMemoryDevice,
    common::{device, pool, pool_with, span},
    std::borrow::Cow,
};

const USAGE: BufferUsageFlags = BufferUsageFlags::STORAGE;
const LOCAL: MemoryPropertyFlags = MemoryPropertyFlags::DEVICE_LOCAL;

fn single_type_device(heap_size: u64, max_objects: u32) -> MockMemoryDevice {
    MockMemoryDevice::new(DeviceProperties {
        memory_types: Cow::Owned(vec![MemoryType {
            heap: 0,
            props: MemoryPropertyFlags::DEVICE_LOCAL,
        }]),
        memory_heaps: Cow::Owned(vec![MemoryHeap { size: heap_size }]),
        max_memory_allocation_count: max_objects,
        max_memory_allocation_size: u64::max_value(),
        non_coherent_atom_size: 1,
    })
}

#[test]
fn buffer_creation_failure_leaves_nothing_behind() {
    let device = device(64);
    let pool = pool(&device, 1024);

    device.fail_next_buffer();
    assert_eq!(
        pool.create_region(100, USAGE, LOCAL).unwrap_err(),
        AllocationError::BufferCreationFailed
    );
    assert_eq!(pool.stats(), PoolStats::default());
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_memory_objects(), 0);

    pool.destroy();
}

#[test]
fn block_allocation_failure_destroys_buffer() {
    let device = device(64);
    let pool = pool(&device, 1024);

    device.fail_next_allocation();
    assert_eq!(
        pool.create_region(100, USAGE, LOCAL).unwrap_err(),
        AllocationError::OutOfDeviceMemory
    );
    assert_eq!(pool.stats(), PoolStats::default());
    assert_eq!(device.live_buffers(), 0);

    // Not retried internally, but the next request succeeds.
    let region = pool.create_region(100, USAGE, LOCAL).unwrap();
    assert_eq!(span(&region), (0, 100));

    pool.destroy();
}

#[test]
fn bind_failure_in_fresh_block_releases_block() {
    let device = device(64);
    let pool = pool(&device, 1024);

    device.fail_next_bind();
    assert_eq!(
        pool.create_region(100, USAGE, LOCAL).unwrap_err(),
        AllocationError::BindFailed
    );
    assert_eq!(pool.stats(), PoolStats::default());
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_memory_objects(), 0);
    assert_eq!(device.total_allocations(), device.total_deallocations());

    pool.destroy();
}

#[test]
fn bind_failure_in_existing_block_registers_nothing() {
    let device = device(64);
    let pool = pool(&device, 1024);

    let first = pool.create_region(300, USAGE, LOCAL).unwrap();

    device.fail_next_bind();
    assert_eq!(
        pool.create_region(300, USAGE, LOCAL).unwrap_err(),
        AllocationError::BindFailed
    );
    assert_eq!(pool.stats().regions, 1);
    assert_eq!(device.live_buffers(), 1);

    // The range the failed request would have taken is still free.
    let second = pool.create_region(300, USAGE, LOCAL).unwrap();
    assert_eq!(span(&second), (320, 620));
    assert_eq!(second.block_index(), first.block_index());

    pool.destroy();
}

#[test]
fn missing_memory_type_is_reported() {
    let device = device(64).with_memory_type_bits(0b001);
    let pool = pool(&device, 1024);

    assert_eq!(
        pool.create_region(100, USAGE, MemoryPropertyFlags::HOST_VISIBLE)
            .unwrap_err(),
        AllocationError::NoSuitableMemoryType
    );
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.total_allocations(), 0);

    pool.destroy();
}

#[test]
fn memory_object_limit_is_respected() {
    let device = single_type_device(1 << 20, 1);
    let pool = pool(&device, 1024);

    let _first = pool.create_region(800, USAGE, LOCAL).unwrap();
    assert_eq!(
        pool.create_region(800, USAGE, LOCAL).unwrap_err(),
        AllocationError::TooManyObjects
    );
    assert_eq!(device.live_buffers(), 1);
    assert_eq!(device.total_allocations(), 1);

    pool.destroy();
}

#[test]
fn heap_budget_is_respected() {
    let device = single_type_device(2048, 16);
    let pool = pool(&device, 1024);

    let _first = pool.create_region(1000, USAGE, LOCAL).unwrap();
    let _second = pool.create_region(1000, USAGE, LOCAL).unwrap();

    let calls = device.total_allocations();
    assert_eq!(
        pool.create_region(1000, USAGE, LOCAL).unwrap_err(),
        AllocationError::OutOfDeviceMemory
    );
    assert_eq!(device.total_allocations(), calls);
    assert_eq!(device.live_buffers(), 2);

    pool.destroy();
}

#[test]
fn padded_requirement_larger_than_block_is_rejected() {
    let device = device(64).with_buffer_size_granularity(2048);
    let pool = pool(&device, 1024);

    assert_eq!(
        pool.create_region(100, USAGE, LOCAL).unwrap_err(),
        AllocationError::RegionTooLarge
    );
    assert_eq!(device.total_buffers(), 1);
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.total_allocations(), 0);
    assert_eq!(pool.stats(), PoolStats::default());

    pool.destroy();
}

#[test]
fn block_size_is_clamped_to_device_limit() {
    let device = MockMemoryDevice::new(DeviceProperties {
        max_memory_allocation_size: 512,
        ..single_type_device(1 << 20, 16).props()
    });
    let pool = pool(&device, 1024);

    assert_eq!(pool.block_size(), 512);
    assert_eq!(
        pool.create_region(513, USAGE, LOCAL).unwrap_err(),
        AllocationError::RegionTooLarge
    );

    pool.destroy();
}

#[test]
fn foreign_region_is_handed_back() {
    let device = device(64);
    let owner = pool(&device, 1024);
    let other = pool(&device, 1024);

    let mine = owner.create_region(100, USAGE, LOCAL).unwrap();
    let theirs = other.create_region(100, USAGE, LOCAL).unwrap();
    assert_eq!(span(&mine), span(&theirs));
    assert_eq!(mine.block_index(), theirs.block_index());

    let rejected = other.destroy_region(mine).unwrap_err();
    assert_eq!(rejected.to_string(), RegionNotFound.to_string());
    assert_eq!(span(rejected.region()), (0, 100));
    assert_eq!(other.stats().regions, 1);
    assert_eq!(device.live_buffers(), 2);

    // Foreign handle left `other` untouched and still frees through its owner.
    owner.destroy_region(rejected.into_region()).unwrap();
    assert_eq!(owner.stats().regions, 0);
    assert_eq!(other.stats().regions, 1);
    other.destroy_region(theirs).unwrap();
    assert_eq!(device.live_buffers(), 0);

    let empty = pool(&device, 1024);
    let stray = owner.create_region(100, USAGE, LOCAL).unwrap();
    let stray = empty.destroy_region(stray).unwrap_err().into_region();
    owner.destroy_region(stray).unwrap();

    empty.destroy();
    other.destroy();
    owner.destroy();

    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_memory_objects(), 0);
}

#[test]
fn released_block_slots_are_reused() {
    let device = device(64);
    let pool = pool_with(
        &device,
        Config {
            block_size: 1024,
            release_empty_blocks: true,
        },
    );

    let keep = pool.create_region(1000, USAGE, LOCAL).unwrap();

    for _ in 0..10_000 {
        let region = pool.create_region(100, USAGE, LOCAL).unwrap();
        assert_eq!(region.block_index(), 1);
        pool.destroy_region(region).unwrap();
    }

    assert_eq!(pool.stats().blocks, 1);
    assert_eq!(device.total_allocations(), 10_001);

    // Freed slot 0 is taken before the arena grows.
    pool.destroy_region(keep).unwrap();
    let first = pool.create_region(100, USAGE, LOCAL).unwrap();
    let second = pool.create_region(1000, USAGE, LOCAL).unwrap();
    assert_eq!(first.block_index(), 0);
    assert_eq!(second.block_index(), 1);

    pool.destroy();
    assert_eq!(device.live_memory_objects(), 0);
}

#[test]
fn empty_blocks_are_released_when_configured() {
    let device = device(64);
    let pool = pool_with(
        &device,
        Config {
            block_size: 1024,
            release_empty_blocks: true,
        },
    );

    let first = pool.create_region(100, USAGE, LOCAL).unwrap();
    let second = pool.create_region(100, USAGE, LOCAL).unwrap();
    let block = first.block_index();

    pool.destroy_region(first).unwrap();
    assert_eq!(pool.stats().blocks, 1);

    pool.destroy_region(second).unwrap();
    assert_eq!(pool.stats(), PoolStats::default());
    assert_eq!(device.live_memory_objects(), 0);

    // Released slot is taken by the next block.
    let third = pool.create_region(100, USAGE, LOCAL).unwrap();
    assert_eq!(third.block_index(), block);
    assert_eq!(span(&third), (0, 100));
    assert_eq!(device.total_allocations(), 2);

    pool.destroy();
}

#[test]
fn teardown_after_destroying_everything_frees_once() {
    let device = device(64);
    let pool = pool(&device, 1024);

    let regions: Vec<_> = (0..6)
        .map(|_| pool.create_region(400, USAGE, LOCAL).unwrap())
        .collect();

    for region in regions {
        pool.destroy_region(region).unwrap();
    }

    // Mock panics on double destroy or double free.
    pool.destroy();

    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_memory_objects(), 0);
    assert_eq!(device.total_buffers(), device.total_destroyed_buffers());
    assert_eq!(device.total_allocations(), device.total_deallocations());
}

#[test]
fn teardown_force_destroys_outstanding_regions() {
    let device = device(64);
    let pool = pool(&device, 1024);

    let mut kept = Vec::new();
    for size in [100, 900, 200, 700, 300] {
        kept.push(pool.create_region(size, USAGE, LOCAL).unwrap());
    }
    let staging = pool
        .create_region(
            64,
            BufferUsageFlags::TRANSFER_SRC,
            MemoryPropertyFlags::HOST_VISIBLE,
        )
        .unwrap();
    pool.map_region(&staging).unwrap();
    kept.push(staging);

    assert_eq!(device.live_buffers(), 6);
    pool.destroy();

    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_memory_objects(), 0);
}
