use crate::{
    disk::{types::BlockNr, BlockStore},
    fs::{
        block::{CheckResult, DataBlock, Expect, Layout, RawBlock, DATA},
        config::{OFS_HEADER_SIZE, T_DATA},
        types::{BlockType, ItemType},
    },
};

/// OFS 数据块：24 字节头 + 数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfsDataBlock {
    raw: RawBlock,
}

impl_layout!(OfsDataBlock);

impl OfsDataBlock {
    pub fn new(nr: BlockNr, bsize: usize) -> Self {
        let mut block = Self {
            raw: RawBlock::new(nr, bsize),
        };
        block.set32(0, T_DATA);
        block
    }

    pub fn file_header_ref(&self) -> BlockNr {
        self.get32(1)
    }

    pub fn set_file_header_ref(&mut self, nr: BlockNr) {
        self.set32(1, nr);
    }

    /// 在文件中的序号（从 1 开始）
    pub fn data_block_nr(&self) -> u32 {
        self.get32(2)
    }

    pub fn set_data_block_nr(&mut self, seq: u32) {
        self.set32(2, seq);
    }

    pub fn data_bytes_in_block(&self) -> usize {
        self.get32(3) as usize
    }

    pub fn set_data_bytes_in_block(&mut self, count: usize) {
        self.set32(3, count as u32);
    }

    pub fn next_data_block_ref(&self) -> BlockNr {
        self.get32(4)
    }

    pub fn set_next_data_block_ref(&mut self, nr: BlockNr) {
        self.set32(4, nr);
    }

    pub(crate) fn check(&self, byte: usize, strict: bool, store: &dyn BlockStore) -> CheckResult {
        if byte >= OFS_HEADER_SIZE {
            return Ok(());
        }
        let e = Expect::new(&self.raw, byte, store);

        match byte / 4 {
            0 => e.long(T_DATA),
            1 if strict => e.ref_to(&[BlockType::FileHeader]),
            2 => e.data_block_nr(),
            3 => e.less_or_equal(self.capacity() as u32),
            4 => e.optional_ref_to(DATA),
            5 => e.long(self.raw.checksum_at(5)),
            _ => Ok(()),
        }
    }

    pub fn item_type(&self, byte: usize) -> ItemType {
        match byte / 4 {
            0 => ItemType::TypeId,
            1 => ItemType::FileheaderRef,
            2 => ItemType::DataBlockNumber,
            3 => ItemType::DataCount,
            4 => ItemType::NextDataBlockRef,
            5 => ItemType::Checksum,
            _ => ItemType::Data,
        }
    }
}

impl DataBlock for OfsDataBlock {
    fn header_size(&self) -> usize {
        OFS_HEADER_SIZE
    }

    fn payload(&self, limit: usize) -> &[u8] {
        let count = self.data_bytes_in_block().min(self.capacity()).min(limit);
        &self.raw.data()[OFS_HEADER_SIZE..OFS_HEADER_SIZE + count]
    }

    fn write_payload(&mut self, bytes: &[u8]) -> usize {
        let count = bytes.len().min(self.capacity());
        self.raw.data_mut()[OFS_HEADER_SIZE..OFS_HEADER_SIZE + count]
            .copy_from_slice(&bytes[..count]);
        self.set_data_bytes_in_block(count);
        count
    }
}

/// FFS 数据块：整块都是数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfsDataBlock {
    raw: RawBlock,
}

impl_layout!(FfsDataBlock);

impl FfsDataBlock {
    pub fn new(nr: BlockNr, bsize: usize) -> Self {
        Self {
            raw: RawBlock::new(nr, bsize),
        }
    }
}

impl DataBlock for FfsDataBlock {
    fn header_size(&self) -> usize {
        0
    }

    fn payload(&self, limit: usize) -> &[u8] {
        let count = self.capacity().min(limit);
        &self.raw.data()[..count]
    }

    fn write_payload(&mut self, bytes: &[u8]) -> usize {
        let count = bytes.len().min(self.capacity());
        self.raw.data_mut()[..count].copy_from_slice(&bytes[..count]);
        count
    }
}
