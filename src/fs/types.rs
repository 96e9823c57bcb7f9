use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// 引导块第 4 个字节（DOS 类型字节）中的标志位
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DosFlags: u8 {
        const FFS = 1;
        const INTL = 2;
        const DIRCACHE = 4;
    }
}

bitflags! {
    /// 文件/目录的保护位。低 4 位在 AmigaDOS 中是“置位即禁止”。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Protection: u32 {
        const DELETE = 1 << 0;
        const EXECUTE = 1 << 1;
        const WRITE = 1 << 2;
        const READ = 1 << 3;
        const ARCHIVE = 1 << 4;
        const PURE = 1 << 5;
        const SCRIPT = 1 << 6;
        const HOLD = 1 << 7;
    }
}

/// 卷（分区）的文件系统格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeType {
    NoDos,
    Ofs,
    Ffs,
    OfsIntl,
    FfsIntl,
    OfsDc,
    FfsDc,
    OfsLnfs,
    FfsLnfs,
}

impl VolumeType {
    /// 由引导块的 DOS 类型字节构造（0..=7）
    pub fn from_dos_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Ofs,
            1 => Self::Ffs,
            2 => Self::OfsIntl,
            3 => Self::FfsIntl,
            4 => Self::OfsDc,
            5 => Self::FfsDc,
            6 => Self::OfsLnfs,
            7 => Self::FfsLnfs,
            _ => Self::NoDos,
        }
    }

    /// 写入引导块的 DOS 类型字节，NoDos 没有对应值
    pub fn dos_byte(self) -> Option<u8> {
        match self {
            Self::NoDos => None,
            Self::Ofs => Some(0),
            Self::Ffs => Some(1),
            Self::OfsIntl => Some(2),
            Self::FfsIntl => Some(3),
            Self::OfsDc => Some(4),
            Self::FfsDc => Some(5),
            Self::OfsLnfs => Some(6),
            Self::FfsLnfs => Some(7),
        }
    }

    pub fn flags(self) -> Option<DosFlags> {
        self.dos_byte().map(DosFlags::from_bits_truncate)
    }

    pub fn is_ofs(self) -> bool {
        self.flags().is_some_and(|f| !f.contains(DosFlags::FFS))
    }

    pub fn is_ffs(self) -> bool {
        self.flags().is_some_and(|f| f.contains(DosFlags::FFS))
    }

    /// 只有纯 OFS / FFS 被完整支持
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Ofs | Self::Ffs)
    }
}

impl fmt::Display for VolumeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoDos => "NODOS",
            Self::Ofs => "OFS",
            Self::Ffs => "FFS",
            Self::OfsIntl => "OFS_INTL",
            Self::FfsIntl => "FFS_INTL",
            Self::OfsDc => "OFS_DC",
            Self::FfsDc => "FFS_DC",
            Self::OfsLnfs => "OFS_LNFS",
            Self::FfsLnfs => "FFS_LNFS",
        };
        f.write_str(s)
    }
}

/// 块的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    Unknown,
    Empty,
    Boot,
    Root,
    Bitmap,
    BitmapExt,
    UserDir,
    FileHeader,
    FileList,
    DataOfs,
    DataFfs,
}

impl BlockType {
    pub fn is_data(self) -> bool {
        matches!(self, Self::DataOfs | Self::DataFfs)
    }

    /// 能出现在目录哈希表中的块
    pub fn is_hashable(self) -> bool {
        matches!(self, Self::UserDir | Self::FileHeader)
    }

    /// 持有哈希表的块（根目录或子目录）
    pub fn is_directory(self) -> bool {
        matches!(self, Self::Root | Self::UserDir)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "UNKNOWN_BLOCK",
            Self::Empty => "EMPTY_BLOCK",
            Self::Boot => "BOOT_BLOCK",
            Self::Root => "ROOT_BLOCK",
            Self::Bitmap => "BITMAP_BLOCK",
            Self::BitmapExt => "BITMAP_EXT_BLOCK",
            Self::UserDir => "USERDIR_BLOCK",
            Self::FileHeader => "FILEHEADER_BLOCK",
            Self::FileList => "FILELIST_BLOCK",
            Self::DataOfs => "DATA_BLOCK_OFS",
            Self::DataFfs => "DATA_BLOCK_FFS",
        };
        f.write_str(s)
    }
}

/// 块内某个字节的用途，供块查看器使用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Unknown,
    Unused,
    DosHeader,
    DosVersion,
    Bootcode,
    TypeId,
    SubtypeId,
    SelfRef,
    Checksum,
    HashtableSize,
    HashRef,
    ProtBits,
    BcplStringLength,
    BcplDiskName,
    BcplDirName,
    BcplFileName,
    BcplComment,
    CreatedDay,
    CreatedMin,
    CreatedTicks,
    ModifiedDay,
    ModifiedMin,
    ModifiedTicks,
    NextHashRef,
    ParentDirRef,
    FileheaderRef,
    ExtBlockRef,
    BitmapBlockRef,
    BitmapExtBlockRef,
    BitmapValidity,
    Filesize,
    DataBlockNumber,
    DataBlockRefCount,
    FirstDataBlockRef,
    NextDataBlockRef,
    DataBlockRef,
    DataCount,
    Data,
    Bitmap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dos_byte_maps_to_volume_type() {
        assert_eq!(VolumeType::from_dos_byte(0), VolumeType::Ofs);
        assert_eq!(VolumeType::from_dos_byte(1), VolumeType::Ffs);
        assert_eq!(VolumeType::from_dos_byte(5), VolumeType::FfsDc);
        assert_eq!(VolumeType::from_dos_byte(8), VolumeType::NoDos);
        assert_eq!(VolumeType::FfsIntl.dos_byte(), Some(3));
        assert_eq!(VolumeType::NoDos.dos_byte(), None);
    }

    #[test]
    fn ofs_and_ffs_families() {
        assert!(VolumeType::Ofs.is_ofs());
        assert!(VolumeType::OfsLnfs.is_ofs());
        assert!(!VolumeType::OfsDc.is_ffs());
        assert!(VolumeType::FfsIntl.is_ffs());
        assert!(!VolumeType::NoDos.is_ofs());
        assert!(!VolumeType::NoDos.is_ffs());
        assert!(!VolumeType::FfsDc.is_supported());
    }
}
