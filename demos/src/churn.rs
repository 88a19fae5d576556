use {
    block_pool::{
        BufferUsageFlags, Config, DeviceProperties, MemoryHeap, MemoryPropertyFlags, MemoryType,
        Pool,
    },
    block_pool_mock::MockMemoryDevice,
    std::{borrow::Cow, collections::VecDeque},
    tracing_subscriber::layer::SubscriberExt as _,
};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .pretty()
            .finish()
            .with(tracing_error::ErrorLayer::default()),
    )?;

    let device = MockMemoryDevice::new(DeviceProperties {
        memory_types: Cow::Owned(vec![MemoryType {
            heap: 0,
            props: MemoryPropertyFlags::DEVICE_LOCAL,
        }]),
        memory_heaps: Cow::Owned(vec![MemoryHeap {
            size: 32 * 1024 * 1024,
        }]),
        max_memory_allocation_count: 5,
        max_memory_allocation_size: 1024 * 1024,
        non_coherent_atom_size: 8,
    })
    .with_buffer_alignment(256);

    let pool = unsafe { Pool::new(&device, Config::i_am_potato(), device.props(), &[]) };

    let mut regions = VecDeque::new();

    for step in 0..100_000u64 {
        if regions.len() >= 1024 {
            while regions.len() > 700 {
                if let Some(region) = regions.pop_front() {
                    pool.destroy_region(region)?;
                }
            }
        }

        let region = pool.create_region(
            128 + (step % 7) * 64,
            BufferUsageFlags::UNIFORM,
            MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        regions.push_back(region);
    }

    while let Some(region) = regions.pop_front() {
        pool.destroy_region(region)?;
    }

    tracing::info!("{:?}", pool.stats());
    pool.destroy();

    tracing::warn!(
        "Total memory object allocations: {}",
        device.total_allocations()
    );

    Ok(())
}
