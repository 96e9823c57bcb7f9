pub mod block_store;
pub mod descriptor;
pub mod image;
pub mod types;

pub use block_store::{BlockArray, BlockStore};
pub use descriptor::{DeviceDescriptor, PartitionDescriptor};
pub use image::{AdfFile, DiskImage, HdfFile};
pub use types::BlockNr;
