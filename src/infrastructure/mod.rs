pub mod channel_registry;
pub mod dispatcher;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
