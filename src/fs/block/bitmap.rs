use crate::{
    disk::{types::BlockNr, BlockStore},
    fs::{
        block::{CheckResult, Expect, Layout, RawBlock},
        config::refs_per_bitmap_ext_block,
        types::{BlockType, ItemType},
    },
};

/// 位图块：字 0 是校验和，其余每一位对应一个块（1 = 空闲）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmapBlock {
    raw: RawBlock,
}

impl_layout!(BitmapBlock);

impl BitmapBlock {
    pub fn new(nr: BlockNr, bsize: usize) -> Self {
        Self {
            raw: RawBlock::new(nr, bsize),
        }
    }

    pub fn bit(&self, byte: usize, bit: usize) -> bool {
        self.raw.data()[byte] & (1 << bit) != 0
    }

    pub fn set_bit(&mut self, byte: usize, bit: usize, value: bool) {
        let b = &mut self.raw.data_mut()[byte];
        if value {
            *b |= 1 << bit;
        } else {
            *b &= !(1 << bit);
        }
    }

    pub(crate) fn check(&self, byte: usize, store: &dyn BlockStore) -> CheckResult {
        if byte < 4 {
            Expect::new(&self.raw, byte, store).long(self.raw.checksum_at(0))
        } else {
            Ok(())
        }
    }

    pub fn item_type(&self, byte: usize) -> ItemType {
        if byte < 4 {
            ItemType::Checksum
        } else {
            ItemType::Bitmap
        }
    }
}

/// 位图扩展块：bsize/4 - 1 个位图块引用，最后一个字指向下一个扩展块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmapExtBlock {
    raw: RawBlock,
}

impl_layout!(BitmapExtBlock);

impl BitmapExtBlock {
    pub fn new(nr: BlockNr, bsize: usize) -> Self {
        Self {
            raw: RawBlock::new(nr, bsize),
        }
    }

    pub fn max_refs(&self) -> usize {
        refs_per_bitmap_ext_block(self.bsize())
    }

    pub fn bitmap_block_ref(&self, i: usize) -> BlockNr {
        if i < self.max_refs() {
            self.get32(i as isize)
        } else {
            0
        }
    }

    pub fn set_bitmap_block_ref(&mut self, i: usize, nr: BlockNr) {
        if i < self.max_refs() {
            self.set32(i as isize, nr);
        }
    }

    pub fn bitmap_block_refs(&self) -> Vec<BlockNr> {
        (0..self.max_refs())
            .map(|i| self.bitmap_block_ref(i))
            .take_while(|&nr| nr != 0)
            .collect()
    }

    pub fn next_bm_ext_block_ref(&self) -> BlockNr {
        self.get32(-1)
    }

    pub fn set_next_bm_ext_block_ref(&mut self, nr: BlockNr) {
        self.set32(-1, nr);
    }

    pub(crate) fn check(&self, byte: usize, store: &dyn BlockStore) -> CheckResult {
        let e = Expect::new(&self.raw, byte, store);
        if byte / 4 < self.max_refs() {
            e.optional_ref_to(&[BlockType::Bitmap])
        } else {
            e.optional_ref_to(&[BlockType::BitmapExt])
        }
    }

    pub fn item_type(&self, byte: usize) -> ItemType {
        if byte / 4 < self.max_refs() {
            ItemType::BitmapBlockRef
        } else {
            ItemType::BitmapExtBlockRef
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::types::BLOCK_SIZE;

    #[test]
    fn bits_flip_independently() {
        let mut bm = BitmapBlock::new(881, BLOCK_SIZE);
        bm.set_bit(7, 3, true);
        assert!(bm.bit(7, 3));
        assert!(!bm.bit(7, 2));
        assert_eq!(bm.raw().data()[7], 0b1000);
        bm.set_bit(7, 3, false);
        assert_eq!(bm.raw().data()[7], 0);
    }

    #[test]
    fn ext_block_refs() {
        let mut ext = BitmapExtBlock::new(900, BLOCK_SIZE);
        assert_eq!(ext.max_refs(), 127);
        ext.set_bitmap_block_ref(0, 901);
        ext.set_bitmap_block_ref(1, 902);
        ext.set_next_bm_ext_block_ref(950);
        assert_eq!(ext.bitmap_block_refs(), vec![901, 902]);
        assert_eq!(ext.get32(127), 950);
        assert_eq!(ext.item_type(508), ItemType::BitmapExtBlockRef);
    }
}
