use {
    ash::{vk, Entry},
    block_pool::{BufferUsageFlags, Config, MemoryPropertyFlags, Pool},
    block_pool_ash::{device_properties, AshMemoryDevice},
    std::ffi::CStr,
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

    let entry = unsafe { Entry::load() }?;
    let version = unsafe { entry.try_enumerate_instance_version() }?
        .unwrap_or(vk::API_VERSION_1_0);

    let app_info = vk::ApplicationInfo::default()
        .engine_name(CStr::from_bytes_with_nul(b"BlockPool\0")?)
        .engine_version(1)
        .application_name(CStr::from_bytes_with_nul(b"BlockPoolApp\0")?)
        .application_version(1)
        .api_version(version);

    let instance = unsafe {
        entry.create_instance(
            &vk::InstanceCreateInfo::default().application_info(&app_info),
            None,
        )
    }?;

    let physical_devices = unsafe { instance.enumerate_physical_devices() }?;
    let physical_device = *physical_devices
        .first()
        .ok_or_else(|| eyre::eyre!("No physical devices"))?;

    let props = unsafe { device_properties(&instance, version, physical_device) }?;

    let priorities = [0f32];
    let queue_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(0)
        .queue_priorities(&priorities)];

    let device = unsafe {
        instance.create_device(
            physical_device,
            &vk::DeviceCreateInfo::default().queue_create_infos(&queue_infos),
            None,
        )
    }?;

    let pool = unsafe {
        Pool::new(
            AshMemoryDevice::wrap(&device),
            Config::i_am_potato(),
            props,
            &[0],
        )
    };

    let vertex_buffer = pool.create_region(
        1024,
        BufferUsageFlags::VERTEX | BufferUsageFlags::TRANSFER_DST,
        MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    let staging = pool.create_region(
        1024,
        BufferUsageFlags::TRANSFER_SRC,
        MemoryPropertyFlags::HOST_VISIBLE,
    )?;

    unsafe { pool.write_bytes(&staging, 0, &[0xab; 1024]) }?;

    pool.destroy_region(staging)?;
    pool.destroy_region(vertex_buffer)?;
    pool.destroy();

    unsafe {
        device.destroy_device(None);
        instance.destroy_instance(None);
    }

    Ok(())
}
