pub mod block;
pub mod config;
pub mod device;
pub mod error;
pub mod host;
pub mod name;
pub mod partition;
pub mod report;
pub mod time;
pub mod types;

pub use block::Block;
pub use device::{Device, ListItem};
pub use error::{BlockError, FileSystemError, Result};
pub use name::{FsComment, FsName};
pub use partition::Partition;
pub use report::ErrorReport;
pub use time::FsTime;
pub use types::{BlockType, ItemType, Protection, VolumeType};
