use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{
    disk::types::{BlockNr, DiskDensity, DiskDiameter, BLOCK_SIZE, FLOPPY_HEADS, RESERVED_BLOCKS},
    fs::{
        config::{bits_per_bitmap_block, refs_per_bitmap_ext_block, ROOT_BITMAP_REFS},
        error::{FileSystemError, Result},
        types::VolumeType,
    },
};

/// 分区布局：只在构造 Device / Partition 时使用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    pub dos: VolumeType,
    pub low_cyl: usize,
    pub high_cyl: usize,
    pub root_block: BlockNr,
    pub bm_blocks: Vec<BlockNr>,
    pub bm_ext_blocks: Vec<BlockNr>,
}

impl PartitionDescriptor {
    /// 只给出根块位置，位图块留空（由调用方填写）
    pub fn new(dos: VolumeType, low_cyl: usize, high_cyl: usize, root_block: BlockNr) -> Self {
        Self {
            dos,
            low_cyl,
            high_cyl,
            root_block,
            bm_blocks: Vec::new(),
            bm_ext_blocks: Vec::new(),
        }
    }

    pub fn first_block(&self, heads: usize, sectors: usize) -> BlockNr {
        (self.low_cyl * heads * sectors) as BlockNr
    }

    pub fn last_block(&self, heads: usize, sectors: usize) -> BlockNr {
        ((self.high_cyl + 1) * heads * sectors - 1) as BlockNr
    }

    pub fn num_blocks(&self, heads: usize, sectors: usize) -> usize {
        (self.high_cyl - self.low_cyl + 1) * heads * sectors
    }

    /// 紧跟在根块后面放置位图块，不够 25 个引用时再追加位图扩展块
    pub fn place_bitmap_blocks(&mut self, heads: usize, sectors: usize, bsize: usize) {
        let tracked = self.num_blocks(heads, sectors).saturating_sub(RESERVED_BLOCKS);
        let bits = bits_per_bitmap_block(bsize);
        let num_bm = tracked.div_ceil(bits).max(1);
        let num_ext = num_bm
            .saturating_sub(ROOT_BITMAP_REFS)
            .div_ceil(refs_per_bitmap_ext_block(bsize));

        let mut next = self.root_block + 1;
        self.bm_blocks = (0..num_bm)
            .map(|_| {
                next += 1;
                next - 1
            })
            .collect();
        self.bm_ext_blocks = (0..num_ext)
            .map(|_| {
                next += 1;
                next - 1
            })
            .collect();
    }
}

/// 设备布局：几何参数 + 分区表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub num_cyls: usize,
    pub num_heads: usize,
    pub num_sectors: usize,
    pub num_reserved: usize,
    pub bsize: usize,
    pub num_blocks: usize,
    pub partitions: Vec<PartitionDescriptor>,
}

impl DeviceDescriptor {
    /// 单分区设备，根块位于分区中间，位图块紧随其后
    pub fn new(
        num_cyls: usize,
        num_heads: usize,
        num_sectors: usize,
        bsize: usize,
        dos: VolumeType,
    ) -> Self {
        let num_blocks = num_cyls * num_heads * num_sectors;
        let high_key = num_blocks.saturating_sub(1);
        let root = ((RESERVED_BLOCKS + high_key) / 2) as BlockNr;

        let mut partition = PartitionDescriptor::new(dos, 0, num_cyls.saturating_sub(1), root);
        partition.place_bitmap_blocks(num_heads, num_sectors, bsize);

        Self {
            num_cyls,
            num_heads,
            num_sectors,
            num_reserved: RESERVED_BLOCKS,
            bsize,
            num_blocks,
            partitions: vec![partition],
        }
    }

    /// 标准软盘：DD 根块 880，HD 根块 1760，位图块紧随根块
    pub fn floppy(diameter: DiskDiameter, density: DiskDensity, dos: VolumeType) -> Result<Self> {
        if diameter == DiskDiameter::Inch525 && density == DiskDensity::Hd {
            return Err(FileSystemError::Unsupported(
                "5.25\" HD floppy disks".to_string(),
            ));
        }
        Ok(Self::new(
            diameter.cylinders(),
            FLOPPY_HEADS,
            density.sectors(),
            BLOCK_SIZE,
            dos,
        ))
    }

    pub fn num_bytes(&self) -> usize {
        self.num_blocks * self.bsize
    }

    /// 构造设备前的一致性检查
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(FileSystemError::InvalidLayout(msg));

        if self.bsize < BLOCK_SIZE || !self.bsize.is_power_of_two() {
            return invalid(format!("unsupported block size {}", self.bsize));
        }
        if self.num_blocks != self.num_cyls * self.num_heads * self.num_sectors {
            return invalid(format!("block count {} does not match geometry", self.num_blocks));
        }
        if self.partitions.is_empty() {
            return invalid("no partitions".to_string());
        }

        let mut next_free_cyl = 0;
        for (i, p) in self.partitions.iter().enumerate() {
            if p.low_cyl < next_free_cyl || p.high_cyl < p.low_cyl || p.high_cyl >= self.num_cyls {
                return invalid(format!("partition {i} has invalid cylinder bounds"));
            }
            next_free_cyl = p.high_cyl + 1;

            let first = p.first_block(self.num_heads, self.num_sectors);
            let last = p.last_block(self.num_heads, self.num_sectors);
            let in_range = |nr: BlockNr| nr >= first + 2 && nr <= last;

            if !in_range(p.root_block) {
                return invalid(format!("partition {i}: root block {} out of range", p.root_block));
            }
            if let Some(nr) = p.bm_blocks.iter().chain(&p.bm_ext_blocks).find(|&&nr| !in_range(nr)) {
                return invalid(format!("partition {i}: bitmap block {nr} out of range"));
            }

            let tracked = p.num_blocks(self.num_heads, self.num_sectors) - RESERVED_BLOCKS;
            if p.bm_blocks.len() * bits_per_bitmap_block(self.bsize) < tracked {
                return invalid(format!("partition {i}: too few bitmap blocks"));
            }
            let ext_capacity = p.bm_ext_blocks.len() * refs_per_bitmap_ext_block(self.bsize);
            if p.bm_blocks.len() > ROOT_BITMAP_REFS + ext_capacity {
                return invalid(format!("partition {i}: too few bitmap extension blocks"));
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// 把布局保存为镜像旁边的 sidecar 文件
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dd_floppy_layout() {
        let d = DeviceDescriptor::floppy(DiskDiameter::Inch35, DiskDensity::Dd, VolumeType::Ofs)
            .unwrap();
        assert_eq!(d.num_blocks, 1760);
        assert_eq!(d.partitions[0].root_block, 880);
        assert_eq!(d.partitions[0].bm_blocks, vec![881]);
        assert!(d.partitions[0].bm_ext_blocks.is_empty());
        assert!(d.validate().is_ok());
    }

    #[test]
    fn hd_floppy_layout() {
        let d = DeviceDescriptor::floppy(DiskDiameter::Inch35, DiskDensity::Hd, VolumeType::Ffs)
            .unwrap();
        assert_eq!(d.num_blocks, 3520);
        assert_eq!(d.partitions[0].root_block, 1760);
        assert_eq!(d.partitions[0].bm_blocks, vec![1761]);
    }

    #[test]
    fn large_disks_need_extension_blocks() {
        // 4064 位/块，26 个位图块需要 1 个扩展块
        let d = DeviceDescriptor::new(3300, 1, 32, BLOCK_SIZE, VolumeType::Ffs);
        let p = &d.partitions[0];
        assert_eq!(p.bm_blocks.len(), 26);
        assert_eq!(p.bm_ext_blocks.len(), 1);
        assert_eq!(p.bm_ext_blocks[0], p.root_block + 27);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn rejects_broken_layouts() {
        let mut d = DeviceDescriptor::floppy(DiskDiameter::Inch35, DiskDensity::Dd, VolumeType::Ofs)
            .unwrap();
        d.partitions[0].bm_blocks.clear();
        assert!(d.validate().is_err());

        let mut d = DeviceDescriptor::floppy(DiskDiameter::Inch35, DiskDensity::Dd, VolumeType::Ofs)
            .unwrap();
        d.partitions[0].root_block = 1;
        assert!(d.validate().is_err());

        assert!(
            DeviceDescriptor::floppy(DiskDiameter::Inch525, DiskDensity::Hd, VolumeType::Ofs)
                .is_err()
        );
    }

    #[test]
    fn layout_survives_bincode() {
        let d = DeviceDescriptor::floppy(DiskDiameter::Inch35, DiskDensity::Hd, VolumeType::Ffs)
            .unwrap();
        let bytes = d.to_bytes().unwrap();
        assert_eq!(DeviceDescriptor::from_bytes(&bytes).unwrap(), d);
    }
}
