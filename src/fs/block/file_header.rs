use crate::{
    disk::{types::BlockNr, BlockStore},
    fs::{
        block::{
            CheckResult, DataRefs, DirEntry, Expect, Layout, RawBlock, DATA, DIRECTORY, HASHABLE,
        },
        config::{ST_FILE, T_HEADER},
        error::BlockError,
        name::FsName,
        time::FsTime,
        types::{BlockType, ItemType},
    },
};

/// 文件头块：名字、大小、前 72 个数据块引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeaderBlock {
    raw: RawBlock,
}

impl_layout!(FileHeaderBlock);
impl DirEntry for FileHeaderBlock {}
impl DataRefs for FileHeaderBlock {}

impl FileHeaderBlock {
    pub fn new(nr: BlockNr, bsize: usize) -> Self {
        let mut block = Self {
            raw: RawBlock::new(nr, bsize),
        };
        block.set32(0, T_HEADER);
        block.set32(1, nr);
        block.set_created(FsTime::now());
        block.set32(-1, ST_FILE);
        block
    }

    pub fn with_name(nr: BlockNr, bsize: usize, name: &FsName) -> Self {
        let mut block = Self::new(nr, bsize);
        block.set_name(name);
        block
    }

    pub fn file_size(&self) -> usize {
        self.get32(-47) as usize
    }

    pub fn set_file_size(&mut self, size: usize) {
        self.set32(-47, size as u32);
    }

    pub(crate) fn check(&self, byte: usize, strict: bool, store: &dyn BlockStore) -> CheckResult {
        let word = self.raw.signed_word(byte);
        let e = Expect::new(&self.raw, byte, store);

        match word {
            0 => return e.long(T_HEADER),
            1 => return e.self_ref(),
            2 => return e.less_or_equal(self.max_data_block_refs() as u32),
            3 => return e.long(0),
            4 => return e.optional_ref_to(DATA),
            5 => return e.long(self.raw.checksum_at(5)),
            -50 => return e.long(0),
            -4 if strict => return e.optional_ref_to(HASHABLE),
            -3 if strict => return e.ref_to(DIRECTORY),
            -2 => return e.optional_ref_to(&[BlockType::FileList]),
            -1 => return e.long(ST_FILE),
            _ => {}
        }

        check_data_ref_area(self, word, &e)
    }

    pub fn item_type(&self, byte: usize) -> ItemType {
        let bsize = self.bsize();
        if byte == bsize - 184 || byte == bsize - 80 {
            return ItemType::BcplStringLength;
        }
        match self.raw.signed_word(byte) {
            0 => ItemType::TypeId,
            1 => ItemType::SelfRef,
            2 => ItemType::DataBlockRefCount,
            3 => ItemType::Unused,
            4 => ItemType::FirstDataBlockRef,
            5 => ItemType::Checksum,
            -50 | -49 => ItemType::Unused,
            -48 => ItemType::ProtBits,
            -47 => ItemType::Filesize,
            -46..=-24 => ItemType::BcplComment,
            -23 => ItemType::CreatedDay,
            -22 => ItemType::CreatedMin,
            -21 => ItemType::CreatedTicks,
            -20..=-5 => ItemType::BcplFileName,
            -4 => ItemType::NextHashRef,
            -3 => ItemType::ParentDirRef,
            -2 => ItemType::ExtBlockRef,
            -1 => ItemType::SubtypeId,
            w if w <= -51 => ItemType::DataBlockRef,
            _ => ItemType::Unused,
        }
    }
}

/// 文件头块和文件扩展块共用的引用表检查
pub(crate) fn check_data_ref_area(
    block: &dyn DataRefs,
    word: isize,
    e: &Expect<'_>,
) -> CheckResult {
    if word > -51 {
        return Ok(());
    }
    if e.value() != 0 {
        e.ref_to(DATA)?;
    }
    if word == -51 {
        let count = block.num_data_block_refs();
        if e.value() == 0 && count > 0 {
            return Err(BlockError::ExpectedRef);
        }
        if e.value() != 0 && count == 0 {
            return Err(BlockError::ExpectedNoRef);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::types::BLOCK_SIZE;

    #[test]
    fn fresh_file_header_block() {
        let mut fh = FileHeaderBlock::with_name(200, BLOCK_SIZE, &FsName::new("x"));
        assert_eq!(fh.get32(-1), (-3i32) as u32);
        assert_eq!(fh.file_size(), 0);
        fh.set_file_size(1234);
        assert_eq!(fh.get32(-47), 1234);
        assert_eq!(fh.max_data_block_refs(), 72);
    }

    #[test]
    fn item_types() {
        let fh = FileHeaderBlock::new(200, BLOCK_SIZE);
        assert_eq!(fh.item_type(8), ItemType::DataBlockRefCount);
        assert_eq!(fh.item_type(308), ItemType::DataBlockRef);
        assert_eq!(fh.item_type(324), ItemType::Filesize);
        assert_eq!(fh.item_type(504), ItemType::ExtBlockRef);
    }
}
