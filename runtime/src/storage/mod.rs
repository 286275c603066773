//! Implementations of the `Storage` trait that can be used by the runtime.

pub mod fs;
pub mod memory;

/// Validate that a partition name contains only allowed characters.
///
/// Partition names must only contain alphanumeric characters, dashes ('-'),
/// or underscores ('_').
pub fn validate_partition_name(partition: &str) -> Result<(), crate::Error> {
    if partition.is_empty()
        || partition
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || ['_', '-'].contains(&c)))
    {
        return Err(crate::Error::PartitionNameInvalid(partition.into()));
    }
    Ok(())
}
