use crate::{
    disk::{types::BlockNr, BlockStore},
    fs::{
        block::{CheckResult, DirEntry, Expect, HashTable, Layout, RawBlock, DIRECTORY, HASHABLE},
        config::{ST_USERDIR, T_HEADER},
        name::FsName,
        time::FsTime,
        types::ItemType,
    },
};

/// 用户目录块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDirBlock {
    raw: RawBlock,
}

impl_layout!(UserDirBlock);
impl HashTable for UserDirBlock {}
impl DirEntry for UserDirBlock {}

impl UserDirBlock {
    pub fn new(nr: BlockNr, bsize: usize) -> Self {
        let mut block = Self {
            raw: RawBlock::new(nr, bsize),
        };
        block.set32(0, T_HEADER);
        block.set32(1, nr);
        block.set_created(FsTime::now());
        block.set32(-1, ST_USERDIR);
        block
    }

    pub fn with_name(nr: BlockNr, bsize: usize, name: &FsName) -> Self {
        let mut block = Self::new(nr, bsize);
        block.set_name(name);
        block
    }

    pub(crate) fn check(&self, byte: usize, strict: bool, store: &dyn BlockStore) -> CheckResult {
        let word = self.raw.signed_word(byte);
        let e = Expect::new(&self.raw, byte, store);

        match word {
            0 => e.long(T_HEADER),
            1 => e.self_ref(),
            2..=4 => e.long(0),
            5 => e.long(self.raw.checksum_at(5)),
            -4 if strict => e.optional_ref_to(HASHABLE),
            -3 if strict => e.ref_to(DIRECTORY),
            -2 => e.long(0),
            -1 => e.long(ST_USERDIR),
            w if w <= -51 => e.optional_ref_to(HASHABLE),
            _ => Ok(()),
        }
    }

    pub fn item_type(&self, byte: usize) -> ItemType {
        let bsize = self.bsize();
        if byte == bsize - 184 || byte == bsize - 80 {
            return ItemType::BcplStringLength;
        }
        match self.raw.signed_word(byte) {
            0 => ItemType::TypeId,
            1 => ItemType::SelfRef,
            2..=4 => ItemType::Unused,
            5 => ItemType::Checksum,
            -50 | -49 | -47 => ItemType::Unused,
            -48 => ItemType::ProtBits,
            -46..=-24 => ItemType::BcplComment,
            -23 => ItemType::CreatedDay,
            -22 => ItemType::CreatedMin,
            -21 => ItemType::CreatedTicks,
            -20..=-5 => ItemType::BcplDirName,
            -4 => ItemType::NextHashRef,
            -3 => ItemType::ParentDirRef,
            -2 => ItemType::Unused,
            -1 => ItemType::SubtypeId,
            w if w <= -51 => ItemType::HashRef,
            _ => ItemType::Unused,
        }
    }
}
