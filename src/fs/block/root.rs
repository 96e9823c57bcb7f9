use crate::{
    disk::{types::BlockNr, BlockStore},
    fs::{
        block::{CheckResult, Expect, HashTable, Layout, RawBlock, HASHABLE},
        config::{BITMAP_VALID, ROOT_BITMAP_REFS, ST_ROOT, T_HEADER},
        name::FsName,
        time::FsTime,
        types::{BlockType, ItemType},
    },
};

/// 根块：卷名、根目录哈希表、位图块引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootBlock {
    raw: RawBlock,
}

impl_layout!(RootBlock);
impl HashTable for RootBlock {}

impl RootBlock {
    pub fn new(nr: BlockNr, bsize: usize) -> Self {
        let mut block = Self {
            raw: RawBlock::new(nr, bsize),
        };
        let size = block.hash_table_size() as u32;
        block.set32(0, T_HEADER);
        block.set32(3, size);
        block.set32(-50, BITMAP_VALID);
        block.set32(-1, ST_ROOT);

        let now = FsTime::now();
        block.set_created(now);
        block.set_modified(now);
        block
    }

    pub fn name(&self) -> FsName {
        FsName::from_bcpl(self.raw.data(), self.bsize() - 80)
    }

    pub fn set_name(&mut self, name: &FsName) {
        let offset = self.bsize() - 80;
        let data = self.raw.data_mut();
        data[offset..offset + 32].fill(0);
        name.write_bcpl(data, offset);
    }

    pub fn created(&self) -> FsTime {
        FsTime::read(self.raw.data(), self.bsize() - 28)
    }

    pub fn set_created(&mut self, time: FsTime) {
        let offset = self.bsize() - 28;
        time.write(self.raw.data_mut(), offset);
    }

    pub fn modified(&self) -> FsTime {
        FsTime::read(self.raw.data(), self.bsize() - 92)
    }

    pub fn set_modified(&mut self, time: FsTime) {
        let offset = self.bsize() - 92;
        time.write(self.raw.data_mut(), offset);
    }

    pub fn bitmap_valid(&self) -> bool {
        self.get32(-50) == BITMAP_VALID
    }

    pub fn bitmap_block_ref(&self, i: usize) -> BlockNr {
        if i < ROOT_BITMAP_REFS {
            self.get32(-49 + i as isize)
        } else {
            0
        }
    }

    pub fn set_bitmap_block_ref(&mut self, i: usize, nr: BlockNr) {
        if i < ROOT_BITMAP_REFS {
            self.set32(-49 + i as isize, nr);
        }
    }

    /// 非零的位图块引用（遇到 0 即停止）
    pub fn bitmap_block_refs(&self) -> Vec<BlockNr> {
        (0..ROOT_BITMAP_REFS)
            .map(|i| self.bitmap_block_ref(i))
            .take_while(|&nr| nr != 0)
            .collect()
    }

    pub fn next_bm_ext_block_ref(&self) -> BlockNr {
        self.get32(-24)
    }

    pub fn set_next_bm_ext_block_ref(&mut self, nr: BlockNr) {
        self.set32(-24, nr);
    }

    pub(crate) fn check(&self, byte: usize, store: &dyn BlockStore) -> CheckResult {
        let word = self.raw.signed_word(byte);
        let e = Expect::new(&self.raw, byte, store);

        match word {
            0 => e.long(T_HEADER),
            1 | 2 | 4 => e.long(0),
            3 => e.hash_table_size(self.hash_table_size()),
            5 => e.long(self.raw.checksum_at(5)),
            -49..=-25 => e.optional_ref_to(&[BlockType::Bitmap]),
            -24 => e.optional_ref_to(&[BlockType::BitmapExt]),
            -4..=-2 => e.long(0),
            -1 => e.long(ST_ROOT),
            w if w <= -51 => e.optional_ref_to(HASHABLE),
            _ => Ok(()),
        }
    }

    pub fn item_type(&self, byte: usize) -> ItemType {
        if byte == self.bsize() - 80 {
            return ItemType::BcplStringLength;
        }
        match self.raw.signed_word(byte) {
            0 => ItemType::TypeId,
            1 | 2 | 4 => ItemType::Unused,
            3 => ItemType::HashtableSize,
            5 => ItemType::Checksum,
            -50 => ItemType::BitmapValidity,
            -49..=-25 => ItemType::BitmapBlockRef,
            -24 => ItemType::BitmapExtBlockRef,
            -23 => ItemType::ModifiedDay,
            -22 => ItemType::ModifiedMin,
            -21 => ItemType::ModifiedTicks,
            -20..=-8 => ItemType::BcplDiskName,
            -7 => ItemType::CreatedDay,
            -6 => ItemType::CreatedMin,
            -5 => ItemType::CreatedTicks,
            -1 => ItemType::SubtypeId,
            w if w <= -51 => ItemType::HashRef,
            _ => ItemType::Unused,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::types::BLOCK_SIZE;

    #[test]
    fn fresh_root_block_layout() {
        let root = RootBlock::new(880, BLOCK_SIZE);
        assert_eq!(root.get32(0), 2);
        assert_eq!(root.get32(3), 72);
        assert_eq!(root.get32(-1), 1);
        assert!(root.bitmap_valid());
        assert_eq!(root.created(), root.modified());
    }

    #[test]
    fn disk_name() {
        let mut root = RootBlock::new(880, BLOCK_SIZE);
        root.set_name(&FsName::new("Workbench"));
        assert_eq!(root.name().to_string(), "Workbench");
        assert_eq!(root.raw().data()[432], 9);
        assert_eq!(root.item_type(432), ItemType::BcplStringLength);
        assert_eq!(root.item_type(433), ItemType::BcplDiskName);
    }

    #[test]
    fn bitmap_refs() {
        let mut root = RootBlock::new(880, BLOCK_SIZE);
        root.set_bitmap_block_ref(0, 881);
        root.set_bitmap_block_ref(1, 882);
        root.set_bitmap_block_ref(25, 999);
        assert_eq!(root.bitmap_block_refs(), vec![881, 882]);
        assert_eq!(root.item_type(root.raw().word_offset(-49)), ItemType::BitmapBlockRef);
    }
}
