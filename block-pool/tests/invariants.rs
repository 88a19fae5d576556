mod common;

use {
    block_pool::{BufferUsageFlags, MemoryPropertyFlags},
    common::{assert_layout, device, pool},
    rand::{rngs::StdRng, Rng as _, SeedableRng as _},
    std::thread,
};

const BLOCK_SIZE: u64 = 4096;
const ALIGNMENT: u64 = 64;
// Mock device allows 64 memory objects.
const MAX_LIVE: usize = 48;

#[test]
fn layout_holds_across_random_create_destroy() {
    let device = device(ALIGNMENT);
    let pool = pool(&device, BLOCK_SIZE);
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut live = Vec::new();

    for step in 0..2000 {
        if live.is_empty() || (live.len() < MAX_LIVE && rng.gen_ratio(3, 5)) {
            let size = rng.gen_range(1..=BLOCK_SIZE / 8);
            live.push(
                pool.create_region(
                    size,
                    BufferUsageFlags::UNIFORM,
                    MemoryPropertyFlags::DEVICE_LOCAL,
                )
                .unwrap(),
            );
        } else {
            let index = rng.gen_range(0..live.len());
            pool.destroy_region(live.swap_remove(index)).unwrap();
        }

        if step % 50 == 0 {
            assert_layout(&live, BLOCK_SIZE, ALIGNMENT);
            assert_eq!(pool.stats().regions, live.len());
        }
    }

    assert_layout(&live, BLOCK_SIZE, ALIGNMENT);
    assert_eq!(
        pool.stats().used_bytes,
        live.iter().map(|region| region.size()).sum::<u64>()
    );

    for region in live.drain(..) {
        pool.destroy_region(region).unwrap();
    }

    assert_eq!(pool.stats().regions, 0);
    pool.destroy();
    assert_eq!(device.live_memory_objects(), 0);
}

#[test]
fn concurrent_creates_do_not_overlap() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 32;

    let device = device(ALIGNMENT);
    let pool = pool(&device, BLOCK_SIZE);

    let regions: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|thread| {
                let pool = &pool;
                scope.spawn(move || {
                    (0..PER_THREAD)
                        .map(|index| {
                            pool.create_region(
                                1 + (thread * 97 + index * 31) % 448,
                                BufferUsageFlags::VERTEX,
                                MemoryPropertyFlags::DEVICE_LOCAL,
                            )
                            .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect()
    });

    assert_eq!(regions.len() as u64, THREADS * PER_THREAD);
    assert_eq!(pool.stats().regions, regions.len());
    assert_layout(&regions, BLOCK_SIZE, ALIGNMENT);

    thread::scope(|scope| {
        let pool = &pool;
        let mut regions = regions;
        while !regions.is_empty() {
            let chunk: Vec<_> = regions.drain(..regions.len().min(PER_THREAD as usize)).collect();
            scope.spawn(move || {
                for region in chunk {
                    pool.destroy_region(region).unwrap();
                }
            });
        }
    });

    assert_eq!(pool.stats().regions, 0);
    pool.destroy();
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_memory_objects(), 0);
}
