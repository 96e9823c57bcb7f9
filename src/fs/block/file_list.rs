use crate::{
    disk::{types::BlockNr, BlockStore},
    fs::{
        block::{file_header::check_data_ref_area, CheckResult, DataRefs, Expect, Layout, RawBlock, DATA},
        config::{ST_FILE, T_LIST},
        types::{BlockType, ItemType},
    },
};

/// 文件扩展块：数据块引用超过 72 个时接在文件头后面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListBlock {
    raw: RawBlock,
}

impl_layout!(FileListBlock);
impl DataRefs for FileListBlock {}

impl FileListBlock {
    pub fn new(nr: BlockNr, bsize: usize) -> Self {
        let mut block = Self {
            raw: RawBlock::new(nr, bsize),
        };
        block.set32(0, T_LIST);
        block.set32(1, nr);
        block.set32(-1, ST_FILE);
        block
    }

    pub fn file_header_ref(&self) -> BlockNr {
        self.get32(-3)
    }

    pub fn set_file_header_ref(&mut self, nr: BlockNr) {
        self.set32(-3, nr);
    }

    pub(crate) fn check(&self, byte: usize, strict: bool, store: &dyn BlockStore) -> CheckResult {
        let word = self.raw.signed_word(byte);
        let e = Expect::new(&self.raw, byte, store);

        match word {
            0 => return e.long(T_LIST),
            1 => return e.self_ref(),
            2 => return e.less_or_equal(self.max_data_block_refs() as u32),
            3 => return e.long(0),
            4 => return e.optional_ref_to(DATA),
            5 => return e.long(self.raw.checksum_at(5)),
            -50 | -4 => return e.long(0),
            -3 if strict => return e.ref_to(&[BlockType::FileHeader]),
            -2 => return e.optional_ref_to(&[BlockType::FileList]),
            -1 => return e.long(ST_FILE),
            _ => {}
        }

        check_data_ref_area(self, word, &e)
    }

    pub fn item_type(&self, byte: usize) -> ItemType {
        match self.raw.signed_word(byte) {
            0 => ItemType::TypeId,
            1 => ItemType::SelfRef,
            2 => ItemType::DataBlockRefCount,
            4 => ItemType::FirstDataBlockRef,
            5 => ItemType::Checksum,
            -3 => ItemType::FileheaderRef,
            -2 => ItemType::ExtBlockRef,
            -1 => ItemType::SubtypeId,
            w if w <= -51 => ItemType::DataBlockRef,
            _ => ItemType::Unused,
        }
    }
}
