use std::{collections::HashSet, path::Path};
use tracing::{debug, warn};

use crate::{
    disk::{
        descriptor::{DeviceDescriptor, PartitionDescriptor},
        types::{
            BlockNr, DiskDensity, DiskDiameter, ADF_SIZE_DD, ADF_SIZE_HD, BLOCK_SIZE, HDF_HEADS,
            HDF_SECTORS, RESERVED_BLOCKS,
        },
    },
    fs::{
        config::{refs_per_bitmap_ext_block, ROOT_BITMAP_REFS},
        device::Device,
        error::{FileSystemError, Result},
        types::VolumeType,
    },
};

/// 磁盘镜像：一段原始字节 + 由镜像推导出的布局
pub trait DiskImage {
    fn data(&self) -> &[u8];

    fn layout(&self) -> Result<DeviceDescriptor>;

    /// 读第 `block` 块的 DOS 头
    fn dos(&self, block: BlockNr) -> VolumeType {
        let offset = block as usize * BLOCK_SIZE;
        match self.data().get(offset..offset + 4) {
            Some([b'D', b'O', b'S', rev]) => VolumeType::from_dos_byte(*rev),
            _ => VolumeType::NoDos,
        }
    }

    fn num_blocks(&self) -> usize {
        self.data().len() / BLOCK_SIZE
    }

    fn write_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.data())?;
        debug!(path = %path.display(), bytes = self.data().len(), "image written");
        Ok(())
    }
}

/// 3.5 寸软盘镜像（ADF）
#[derive(Debug, Clone)]
pub struct AdfFile {
    data: Vec<u8>,
}

impl AdfFile {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        match data.len() {
            ADF_SIZE_DD | ADF_SIZE_HD => Ok(Self { data }),
            actual => Err(FileSystemError::WrongCapacity {
                expected: ADF_SIZE_DD,
                actual,
            }),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// 导出整个设备（校验和会先被修正）
    pub fn from_device(device: &mut Device) -> Result<Self> {
        let mut data = vec![0; device.num_bytes()];
        device.export_volume(&mut data)?;
        Self::from_bytes(data)
    }

    pub fn density(&self) -> DiskDensity {
        if self.data.len() == ADF_SIZE_HD {
            DiskDensity::Hd
        } else {
            DiskDensity::Dd
        }
    }
}

impl DiskImage for AdfFile {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn layout(&self) -> Result<DeviceDescriptor> {
        DeviceDescriptor::floppy(DiskDiameter::Inch35, self.density(), self.dos(0))
    }
}

/// 硬盘镜像（HDF）：1 个磁头，每磁道 32 个扇区，单分区
#[derive(Debug, Clone)]
pub struct HdfFile {
    data: Vec<u8>,
}

impl HdfFile {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let track = HDF_HEADS * HDF_SECTORS * BLOCK_SIZE;
        if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
            return Err(FileSystemError::WrongBlockSize(data.len()));
        }
        if data.len() % track != 0 {
            return Err(FileSystemError::WrongCapacity {
                expected: data.len().next_multiple_of(track),
                actual: data.len(),
            });
        }
        Ok(Self { data })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    pub fn from_device(device: &mut Device) -> Result<Self> {
        let mut data = vec![0; device.num_bytes()];
        device.export_volume(&mut data)?;
        Self::from_bytes(data)
    }

    pub fn num_cyls(&self) -> usize {
        self.num_blocks() / (HDF_HEADS * HDF_SECTORS)
    }

    fn word(&self, block: BlockNr, n: isize) -> Option<u32> {
        let base = block as usize * BLOCK_SIZE;
        let offset = if n >= 0 {
            base + 4 * n as usize
        } else {
            (base + BLOCK_SIZE).checked_sub(4 * n.unsigned_abs())?
        };
        let w = self.data.get(offset..offset + 4)?;
        Some(u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
    }

    /// 从根块和扩展块链中读出位图块位置
    fn bitmap_layout(&self, root: BlockNr) -> (Vec<BlockNr>, Vec<BlockNr>) {
        let mut bm_blocks: Vec<BlockNr> = (0..ROOT_BITMAP_REFS as isize)
            .filter_map(|i| self.word(root, -49 + i))
            .take_while(|&nr| nr != 0)
            .collect();

        let mut bm_ext_blocks = Vec::new();
        let mut visited = HashSet::new();
        let mut ext = self.word(root, -24).unwrap_or(0);

        while ext != 0 && (ext as usize) < self.num_blocks() {
            if !visited.insert(ext) {
                warn!(block = ext, "bitmap extension chain has cycles");
                break;
            }
            bm_ext_blocks.push(ext);
            bm_blocks.extend(
                (0..refs_per_bitmap_ext_block(BLOCK_SIZE) as isize)
                    .filter_map(|i| self.word(ext, i))
                    .take_while(|&nr| nr != 0),
            );
            ext = self.word(ext, -1).unwrap_or(0);
        }
        (bm_blocks, bm_ext_blocks)
    }
}

impl DiskImage for HdfFile {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn layout(&self) -> Result<DeviceDescriptor> {
        let num_cyls = self.num_cyls();
        let high_key = self.num_blocks() - 1;
        let root = ((RESERVED_BLOCKS + high_key) / 2) as BlockNr;
        let (bm_blocks, bm_ext_blocks) = self.bitmap_layout(root);

        let mut partition = PartitionDescriptor::new(self.dos(0), 0, num_cyls - 1, root);
        partition.bm_blocks = bm_blocks;
        partition.bm_ext_blocks = bm_ext_blocks;

        let desc = DeviceDescriptor {
            num_cyls,
            num_heads: HDF_HEADS,
            num_sectors: HDF_SECTORS,
            num_reserved: RESERVED_BLOCKS,
            bsize: BLOCK_SIZE,
            num_blocks: self.num_blocks(),
            partitions: vec![partition],
        };
        desc.validate()?;
        Ok(desc)
    }
}
