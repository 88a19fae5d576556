use {
    block_pool::{BufferUsageFlags, Config, MemoryPropertyFlags, Pool},
    block_pool_mock::MockMemoryDevice,
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

    let device = MockMemoryDevice::typical(64 * 1024 * 1024);

    // Graphics and transfer families.
    let pool = unsafe { Pool::new(&device, Config::i_am_potato(), device.props(), &[0, 1]) };

    let vertices: Vec<u8> = (0..=255).cycle().take(3 * 1024).collect();

    let vertex_buffer = pool.create_region(
        vertices.len() as u64,
        BufferUsageFlags::VERTEX | BufferUsageFlags::TRANSFER_DST,
        MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    let staging = pool.create_region(
        vertices.len() as u64,
        BufferUsageFlags::TRANSFER_SRC,
        MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
    )?;

    unsafe { pool.write_bytes(&staging, 0, &vertices) }?;

    // Copy command from `staging` into `vertex_buffer` would be recorded and awaited here.

    pool.destroy_region(staging)?;

    tracing::info!(
        "Vertex buffer lives at [{}, {}) of block {}",
        vertex_buffer.start(),
        vertex_buffer.end(),
        vertex_buffer.block_index()
    );

    tracing::info!("{:?}", pool.stats());

    pool.destroy_region(vertex_buffer)?;
    pool.destroy();

    tracing::warn!(
        "Total memory object allocations: {}",
        device.total_allocations()
    );

    Ok(())
}
