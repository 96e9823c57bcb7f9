use serde::{Deserialize, Serialize};

/// 块号类型：设备内的绝对块号
/// 0 号块永远是引导块，因此 0 也被当作“空引用”使用。
pub type BlockNr = u32;

/// 默认逻辑块（Block）大小：512 字节
pub const BLOCK_SIZE: usize = 512;

/// 标准软盘的磁头数
pub const FLOPPY_HEADS: usize = 2;

/// 3.5 寸软盘的柱面数
pub const FLOPPY_CYLS_35: usize = 80;

/// 5.25 寸软盘的柱面数
pub const FLOPPY_CYLS_525: usize = 40;

/// DD 软盘每磁道扇区数
pub const SECTORS_DD: usize = 11;

/// HD 软盘每磁道扇区数
pub const SECTORS_HD: usize = 22;

/// DD 软盘镜像大小：80 * 2 * 11 * 512 = 901120 字节
pub const ADF_SIZE_DD: usize = FLOPPY_CYLS_35 * FLOPPY_HEADS * SECTORS_DD * BLOCK_SIZE;

/// HD 软盘镜像大小：80 * 2 * 22 * 512 = 1802240 字节
pub const ADF_SIZE_HD: usize = FLOPPY_CYLS_35 * FLOPPY_HEADS * SECTORS_HD * BLOCK_SIZE;

/// 硬盘镜像（HDF）的固定几何参数
pub const HDF_HEADS: usize = 1;
pub const HDF_SECTORS: usize = 32;

/// 每个分区开头保留的块数（两个引导块）
pub const RESERVED_BLOCKS: usize = 2;

/// 软盘尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskDiameter {
    Inch35,
    Inch525,
}

/// 软盘密度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskDensity {
    Dd,
    Hd,
}

impl DiskDiameter {
    pub fn cylinders(self) -> usize {
        match self {
            Self::Inch35 => FLOPPY_CYLS_35,
            Self::Inch525 => FLOPPY_CYLS_525,
        }
    }
}

impl DiskDensity {
    pub fn sectors(self) -> usize {
        match self {
            Self::Dd => SECTORS_DD,
            Self::Hd => SECTORS_HD,
        }
    }
}
