use {
    crate::error::AllocationError,
    block_pool_types::{MemoryPropertyFlags, MemoryType},
};

/// Returns index of the first memory type allowed by `type_bits`
/// whose properties contain all of `props`.
#[cfg_attr(feature = "tracing", tracing::instrument(skip(memory_types)))]
pub fn find_memory_type(
    memory_types: &[MemoryType],
    type_bits: u32,
    props: MemoryPropertyFlags,
) -> Result<u32, AllocationError> {
    let found = memory_types
        .iter()
        .enumerate()
        .take(32)
        .find(|(index, memory_type)| {
            type_bits & (1 << index) != 0 && memory_type.props.contains(props)
        })
        .map(|(index, _)| index as u32);

    match found {
        Some(index) => Ok(index),
        None => {
            #[cfg(feature = "tracing")]
            tracing::error!(
                "No memory type among bitset `{:#b}` has properties {:?}",
                type_bits,
                props
            );

            Err(AllocationError::NoSuitableMemoryType)
        }
    }
}
