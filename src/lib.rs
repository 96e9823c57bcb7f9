//! Amiga OFS/FFS 文件系统的内存模型
//!
//! 整张软盘或硬盘镜像都放在内存里，按块（Block）组织，
//! 支持目录、文件、位图分配、校验和检查，以及与 ADF/HDF 镜像和宿主机目录之间的导入导出。

pub mod disk;
pub mod fs;
pub mod utils;
