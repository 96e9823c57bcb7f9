//! 块（Block）：一个扇区的字节 + 按类型解释的字段
//!
//! 所有多字节字段都是大端 32 位字，用有符号字号寻址：
//! 非负数从块头开始数，负数从块尾倒数。

use tracing::trace;

use crate::{
    disk::{types::BlockNr, BlockStore},
    fs::{
        config::{refs_per_block, HASH_TABLE_START},
        error::{BlockError, FileSystemError, Result},
        name::{FsComment, FsName},
        partition::Partition,
        time::FsTime,
        types::{BlockType, ItemType, Protection},
    },
};

/// 为持有 `raw` 字段的块类型实现 Layout
macro_rules! impl_layout {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::fs::block::Layout for $ty {
                fn raw(&self) -> &$crate::fs::block::RawBlock {
                    &self.raw
                }

                fn raw_mut(&mut self) -> &mut $crate::fs::block::RawBlock {
                    &mut self.raw
                }
            }
        )*
    };
}

mod bitmap;
mod boot;
mod data;
mod dir;
mod file_header;
mod file_list;
mod root;

pub use bitmap::{BitmapBlock, BitmapExtBlock};
pub use boot::{boot_checksum, BootBlock};
pub use data::{FfsDataBlock, OfsDataBlock};
pub use dir::UserDirBlock;
pub use file_header::FileHeaderBlock;
pub use file_list::FileListBlock;
pub use root::RootBlock;

/// 块的原始数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    nr: BlockNr,
    data: Vec<u8>,
}

impl RawBlock {
    pub fn new(nr: BlockNr, bsize: usize) -> Self {
        Self {
            nr,
            data: vec![0; bsize],
        }
    }

    pub fn nr(&self) -> BlockNr {
        self.nr
    }

    pub fn bsize(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// 字号 -> 字节偏移：n >= 0 时为 4n，n < 0 时为 bsize + 4n
    pub fn word_offset(&self, n: isize) -> usize {
        if n >= 0 {
            4 * n as usize
        } else {
            (self.bsize() as isize + 4 * n) as usize
        }
    }

    /// 字节偏移 -> 有符号字号（前 6 个字用正数，其余用负数）
    pub fn signed_word(&self, byte: usize) -> isize {
        let word = (byte / 4) as isize;
        if word >= HASH_TABLE_START {
            word - (self.bsize() / 4) as isize
        } else {
            word
        }
    }

    pub fn get32(&self, n: isize) -> u32 {
        let p = self.word_offset(n);
        let d = &self.data;
        u32::from_be_bytes([d[p], d[p + 1], d[p + 2], d[p + 3]])
    }

    pub fn set32(&mut self, n: isize, value: u32) {
        let p = self.word_offset(n);
        self.data[p..p + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// 把 `loc` 处的字当作 0，对所有字求和后取补码
    pub fn checksum_at(&self, loc: isize) -> u32 {
        let skip = self.word_offset(loc);
        let sum = self
            .data
            .chunks_exact(4)
            .enumerate()
            .filter(|(i, _)| 4 * i != skip)
            .fold(0u32, |acc, (_, w)| {
                acc.wrapping_add(u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
            });
        sum.wrapping_neg()
    }
}

/// 所有块类型共享的原始数据访问
pub trait Layout {
    fn raw(&self) -> &RawBlock;
    fn raw_mut(&mut self) -> &mut RawBlock;

    fn nr(&self) -> BlockNr {
        self.raw().nr()
    }

    fn bsize(&self) -> usize {
        self.raw().bsize()
    }

    fn get32(&self, n: isize) -> u32 {
        self.raw().get32(n)
    }

    fn set32(&mut self, n: isize, value: u32) {
        self.raw_mut().set32(n, value);
    }
}

/// 带哈希表的块：根块、用户目录块
pub trait HashTable: Layout {
    fn hash_table_size(&self) -> usize {
        refs_per_block(self.bsize())
    }

    fn hash_ref(&self, slot: usize) -> BlockNr {
        if slot < self.hash_table_size() {
            self.get32(HASH_TABLE_START + slot as isize)
        } else {
            0
        }
    }

    fn set_hash_ref(&mut self, slot: usize, nr: BlockNr) {
        if slot < self.hash_table_size() {
            self.set32(HASH_TABLE_START + slot as isize, nr);
        }
    }
}

/// 能挂进目录哈希表的块：用户目录块、文件头块
///
/// 两者的尾部布局完全相同，因此字段访问都写成默认实现。
pub trait DirEntry: Layout {
    fn name(&self) -> FsName {
        FsName::from_bcpl(self.raw().data(), self.bsize() - 80)
    }

    fn set_name(&mut self, name: &FsName) {
        let offset = self.bsize() - 80;
        let data = self.raw_mut().data_mut();
        data[offset..offset + 32].fill(0);
        name.write_bcpl(data, offset);
    }

    fn comment(&self) -> FsComment {
        FsComment::from_bcpl(self.raw().data(), self.bsize() - 184)
    }

    fn set_comment(&mut self, comment: &FsComment) {
        let offset = self.bsize() - 184;
        let data = self.raw_mut().data_mut();
        data[offset..offset + 92].fill(0);
        comment.write_bcpl(data, offset);
    }

    fn created(&self) -> FsTime {
        FsTime::read(self.raw().data(), self.bsize() - 92)
    }

    fn set_created(&mut self, time: FsTime) {
        let offset = self.bsize() - 92;
        time.write(self.raw_mut().data_mut(), offset);
    }

    fn protection(&self) -> Protection {
        Protection::from_bits_retain(self.get32(-48))
    }

    fn set_protection(&mut self, bits: Protection) {
        self.set32(-48, bits.bits());
    }

    fn next_hash_ref(&self) -> BlockNr {
        self.get32(-4)
    }

    fn set_next_hash_ref(&mut self, nr: BlockNr) {
        self.set32(-4, nr);
    }

    fn parent_dir_ref(&self) -> BlockNr {
        self.get32(-3)
    }

    fn set_parent_dir_ref(&mut self, nr: BlockNr) {
        self.set32(-3, nr);
    }

    fn hash_value(&self) -> u32 {
        self.name().hash_value()
    }
}

/// 带数据块引用表的块：文件头块、文件扩展块
///
/// 引用表倒序存放：第 i 个引用位于字 -51 - i。
pub trait DataRefs: Layout {
    fn max_data_block_refs(&self) -> usize {
        refs_per_block(self.bsize())
    }

    fn num_data_block_refs(&self) -> usize {
        self.get32(2) as usize
    }

    fn set_num_data_block_refs(&mut self, count: usize) {
        self.set32(2, count as u32);
    }

    fn first_data_block_ref(&self) -> BlockNr {
        self.get32(4)
    }

    fn set_first_data_block_ref(&mut self, nr: BlockNr) {
        self.set32(4, nr);
    }

    fn data_block_ref(&self, i: usize) -> BlockNr {
        if i < self.max_data_block_refs() {
            self.get32(-51 - i as isize)
        } else {
            0
        }
    }

    fn set_data_block_ref(&mut self, i: usize, nr: BlockNr) {
        if i < self.max_data_block_refs() {
            self.set32(-51 - i as isize, nr);
        }
    }

    fn next_list_block_ref(&self) -> BlockNr {
        self.get32(-2)
    }

    fn set_next_list_block_ref(&mut self, nr: BlockNr) {
        self.set32(-2, nr);
    }

    /// 有效的引用（计数超过上限时按上限截断）
    fn data_block_refs(&self) -> Vec<BlockNr> {
        let count = self.num_data_block_refs().min(self.max_data_block_refs());
        (0..count).map(|i| self.data_block_ref(i)).collect()
    }

    /// 表满时返回 false；`first` 是整个文件的第一个数据块
    fn add_data_block_ref(&mut self, first: BlockNr, nr: BlockNr) -> bool {
        let count = self.num_data_block_refs();
        if count >= self.max_data_block_refs() {
            return false;
        }
        if count == 0 {
            self.set_first_data_block_ref(first);
        }
        self.set_data_block_ref(count, nr);
        self.set_num_data_block_refs(count + 1);
        true
    }
}

/// 数据块：OFS 带 24 字节头，FFS 全是数据
pub trait DataBlock: Layout {
    fn header_size(&self) -> usize;

    /// 每块可存放的数据字节数
    fn capacity(&self) -> usize {
        self.bsize() - self.header_size()
    }

    /// 块内有效数据，最多 `limit` 字节
    fn payload(&self, limit: usize) -> &[u8];

    /// 写入尽可能多的数据，返回写入的字节数
    fn write_payload(&mut self, bytes: &[u8]) -> usize;
}

/// 空闲块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyBlock {
    raw: RawBlock,
}

impl_layout!(EmptyBlock);

/// 单字节完整性检查的上下文
pub(crate) struct Expect<'a> {
    store: &'a dyn BlockStore,
    nr: BlockNr,
    byte: usize,
    value: u32,
}

pub(crate) type CheckResult = std::result::Result<(), BlockError>;

impl<'a> Expect<'a> {
    pub fn new(raw: &RawBlock, byte: usize, store: &'a dyn BlockStore) -> Self {
        Self {
            store,
            nr: raw.nr(),
            byte,
            value: raw.get32((byte / 4) as isize),
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// 只比较当前字节对应的那一部分
    pub fn long(&self, expected: u32) -> CheckResult {
        let shift = 24 - 8 * (self.byte % 4);
        let want = (expected >> shift) as u8;
        if (self.value >> shift) as u8 == want {
            Ok(())
        } else {
            Err(BlockError::ExpectedValue(want))
        }
    }

    pub fn self_ref(&self) -> CheckResult {
        if self.value == self.nr {
            Ok(())
        } else {
            Err(BlockError::ExpectedSelfRef)
        }
    }

    pub fn less_or_equal(&self, max: u32) -> CheckResult {
        if self.value <= max {
            Ok(())
        } else {
            Err(BlockError::ExpectedSmallerValue(max))
        }
    }

    pub fn data_block_nr(&self) -> CheckResult {
        if self.value != 0 {
            Ok(())
        } else {
            Err(BlockError::ExpectedDataBlockNr)
        }
    }

    pub fn hash_table_size(&self, size: usize) -> CheckResult {
        if self.value as usize == size {
            Ok(())
        } else {
            Err(BlockError::InvalidHashTableSize)
        }
    }

    /// 引用必须指向给定类型之一
    pub fn ref_to(&self, types: &[BlockType]) -> CheckResult {
        match self.store.block(self.value) {
            None => Err(BlockError::PtrOutOfRange),
            Some(b) if types.contains(&b.block_type()) => Ok(()),
            Some(b) => Err(BlockError::PtrToWrongType(b.block_type())),
        }
    }

    /// 0 表示没有引用
    pub fn optional_ref_to(&self, types: &[BlockType]) -> CheckResult {
        if self.value == 0 {
            Ok(())
        } else {
            self.ref_to(types)
        }
    }
}

pub(crate) const HASHABLE: &[BlockType] = &[BlockType::UserDir, BlockType::FileHeader];
pub(crate) const DIRECTORY: &[BlockType] = &[BlockType::Root, BlockType::UserDir];
pub(crate) const DATA: &[BlockType] = &[BlockType::DataOfs, BlockType::DataFfs];

/// 一个块：封闭的块类型集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Empty(EmptyBlock),
    Boot(BootBlock),
    Root(RootBlock),
    Bitmap(BitmapBlock),
    BitmapExt(BitmapExtBlock),
    UserDir(UserDirBlock),
    FileHeader(FileHeaderBlock),
    FileList(FileListBlock),
    DataOfs(OfsDataBlock),
    DataFfs(FfsDataBlock),
}

macro_rules! dispatch {
    ($block:expr, $b:ident => $e:expr) => {
        match $block {
            Block::Empty($b) => $e,
            Block::Boot($b) => $e,
            Block::Root($b) => $e,
            Block::Bitmap($b) => $e,
            Block::BitmapExt($b) => $e,
            Block::UserDir($b) => $e,
            Block::FileHeader($b) => $e,
            Block::FileList($b) => $e,
            Block::DataOfs($b) => $e,
            Block::DataFfs($b) => $e,
        }
    };
}

impl Block {
    pub fn empty(nr: BlockNr, bsize: usize) -> Self {
        Self::Empty(EmptyBlock {
            raw: RawBlock::new(nr, bsize),
        })
    }

    /// 按类型构造新块，类型号 / 子类型号 / 自引用 / 创建时间已填好
    ///
    /// `Unknown` 没有对应的块，返回 `None`。
    pub fn make_with_type(partition: &Partition, nr: BlockNr, ty: BlockType) -> Option<Self> {
        let bsize = partition.bsize();
        let block = match ty {
            BlockType::Unknown => return None,
            BlockType::Empty => Self::empty(nr, bsize),
            BlockType::Boot => {
                let page = nr.saturating_sub(partition.first_block) as usize;
                Self::Boot(BootBlock::new(nr, bsize, page, partition.dos))
            }
            BlockType::Root => Self::Root(RootBlock::new(nr, bsize)),
            BlockType::Bitmap => Self::Bitmap(BitmapBlock::new(nr, bsize)),
            BlockType::BitmapExt => Self::BitmapExt(BitmapExtBlock::new(nr, bsize)),
            BlockType::UserDir => Self::UserDir(UserDirBlock::new(nr, bsize)),
            BlockType::FileHeader => Self::FileHeader(FileHeaderBlock::new(nr, bsize)),
            BlockType::FileList => Self::FileList(FileListBlock::new(nr, bsize)),
            BlockType::DataOfs => Self::DataOfs(OfsDataBlock::new(nr, bsize)),
            BlockType::DataFfs => Self::DataFfs(FfsDataBlock::new(nr, bsize)),
        };
        Some(block)
    }

    pub fn block_type(&self) -> BlockType {
        match self {
            Self::Empty(_) => BlockType::Empty,
            Self::Boot(_) => BlockType::Boot,
            Self::Root(_) => BlockType::Root,
            Self::Bitmap(_) => BlockType::Bitmap,
            Self::BitmapExt(_) => BlockType::BitmapExt,
            Self::UserDir(_) => BlockType::UserDir,
            Self::FileHeader(_) => BlockType::FileHeader,
            Self::FileList(_) => BlockType::FileList,
            Self::DataOfs(_) => BlockType::DataOfs,
            Self::DataFfs(_) => BlockType::DataFfs,
        }
    }

    pub fn raw(&self) -> &RawBlock {
        dispatch!(self, b => b.raw())
    }

    pub fn raw_mut(&mut self) -> &mut RawBlock {
        dispatch!(self, b => b.raw_mut())
    }

    pub fn nr(&self) -> BlockNr {
        self.raw().nr()
    }

    pub fn bsize(&self) -> usize {
        self.raw().bsize()
    }

    pub fn data(&self) -> &[u8] {
        self.raw().data()
    }

    pub fn get32(&self, n: isize) -> u32 {
        self.raw().get32(n)
    }

    pub fn set32(&mut self, n: isize, value: u32) {
        self.raw_mut().set32(n, value);
    }

    pub fn type_id(&self) -> u32 {
        self.get32(0)
    }

    pub fn subtype_id(&self) -> u32 {
        self.get32(-1)
    }

    /// 校验和所在的字；引导块的校验和跨两个块，由分区负责
    pub fn checksum_location(&self) -> Option<isize> {
        match self {
            Self::Root(_)
            | Self::UserDir(_)
            | Self::FileHeader(_)
            | Self::FileList(_)
            | Self::DataOfs(_) => Some(5),
            Self::Bitmap(_) => Some(0),
            _ => None,
        }
    }

    /// 按当前内容计算的校验和，不修改块
    pub fn checksum(&self) -> Option<u32> {
        self.checksum_location()
            .map(|loc| self.raw().checksum_at(loc))
    }

    pub fn update_checksum(&mut self) {
        if let Some(loc) = self.checksum_location() {
            let sum = self.raw().checksum_at(loc);
            self.set32(loc, sum);
        }
    }

    /// 检查块内第 `byte` 个字节
    ///
    /// `strict = false` 时忽略旧磁盘上常见的一类不一致：
    /// 本该指向文件头（或父目录）的字段里存的是位图块号。
    pub fn check_byte(
        &self,
        byte: usize,
        strict: bool,
        store: &dyn BlockStore,
    ) -> std::result::Result<(), BlockError> {
        match self {
            Self::Empty(_) | Self::DataFfs(_) => Ok(()),
            Self::Boot(b) => b.check(byte, store),
            Self::Root(b) => b.check(byte, store),
            Self::Bitmap(b) => b.check(byte, store),
            Self::BitmapExt(b) => b.check(byte, store),
            Self::UserDir(b) => b.check(byte, strict, store),
            Self::FileHeader(b) => b.check(byte, strict, store),
            Self::FileList(b) => b.check(byte, strict, store),
            Self::DataOfs(b) => b.check(byte, strict, store),
        }
    }

    /// 返回有问题的字节数
    pub fn check(&self, strict: bool, store: &dyn BlockStore) -> usize {
        (0..self.bsize())
            .filter(|&i| match self.check_byte(i, strict, store) {
                Ok(()) => false,
                Err(e) => {
                    trace!(block = self.nr(), word = i / 4, byte = i % 4, error = %e, "corrupted byte");
                    true
                }
            })
            .count()
    }

    /// 字节 `byte` 在该块中的用途
    pub fn item_type(&self, byte: usize) -> ItemType {
        match self {
            Self::Empty(_) => ItemType::Unused,
            Self::Boot(b) => b.item_type(byte),
            Self::Root(b) => b.item_type(byte),
            Self::Bitmap(b) => b.item_type(byte),
            Self::BitmapExt(b) => b.item_type(byte),
            Self::UserDir(b) => b.item_type(byte),
            Self::FileHeader(b) => b.item_type(byte),
            Self::FileList(b) => b.item_type(byte),
            Self::DataOfs(b) => b.item_type(byte),
            Self::DataFfs(_) => ItemType::Data,
        }
    }

    /// 原样拷入
    pub fn import_block(&mut self, src: &[u8]) -> Result<()> {
        if src.len() != self.bsize() {
            return Err(FileSystemError::WrongBlockSize(src.len()));
        }
        self.raw_mut().data_mut().copy_from_slice(src);
        Ok(())
    }

    /// 先修正校验和再拷出
    pub fn export_block(&mut self, dst: &mut [u8]) -> Result<()> {
        if dst.len() != self.bsize() {
            return Err(FileSystemError::WrongBlockSize(dst.len()));
        }
        self.update_checksum();
        dst.copy_from_slice(self.data());
        Ok(())
    }

    /// 根块的卷名或目录项的名字
    pub fn name(&self) -> Option<FsName> {
        match self {
            Self::Root(b) => Some(b.name()),
            _ => self.as_entry().map(DirEntry::name),
        }
    }

    /// 只对用户目录块和文件头块有意义
    pub fn hash_value(&self) -> Option<u32> {
        self.as_entry().map(DirEntry::hash_value)
    }

    pub fn as_boot(&self) -> Option<&BootBlock> {
        match self {
            Self::Boot(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_boot_mut(&mut self) -> Option<&mut BootBlock> {
        match self {
            Self::Boot(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_root(&self) -> Option<&RootBlock> {
        match self {
            Self::Root(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_root_mut(&mut self) -> Option<&mut RootBlock> {
        match self {
            Self::Root(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bitmap(&self) -> Option<&BitmapBlock> {
        match self {
            Self::Bitmap(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bitmap_mut(&mut self) -> Option<&mut BitmapBlock> {
        match self {
            Self::Bitmap(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bitmap_ext(&self) -> Option<&BitmapExtBlock> {
        match self {
            Self::BitmapExt(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bitmap_ext_mut(&mut self) -> Option<&mut BitmapExtBlock> {
        match self {
            Self::BitmapExt(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_user_dir(&self) -> Option<&UserDirBlock> {
        match self {
            Self::UserDir(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_file_header(&self) -> Option<&FileHeaderBlock> {
        match self {
            Self::FileHeader(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_file_header_mut(&mut self) -> Option<&mut FileHeaderBlock> {
        match self {
            Self::FileHeader(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_file_list(&self) -> Option<&FileListBlock> {
        match self {
            Self::FileList(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_file_list_mut(&mut self) -> Option<&mut FileListBlock> {
        match self {
            Self::FileList(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_ofs_data(&self) -> Option<&OfsDataBlock> {
        match self {
            Self::DataOfs(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_ofs_data_mut(&mut self) -> Option<&mut OfsDataBlock> {
        match self {
            Self::DataOfs(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_hash_table(&self) -> Option<&dyn HashTable> {
        match self {
            Self::Root(b) => Some(b),
            Self::UserDir(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_hash_table_mut(&mut self) -> Option<&mut dyn HashTable> {
        match self {
            Self::Root(b) => Some(b),
            Self::UserDir(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_entry(&self) -> Option<&dyn DirEntry> {
        match self {
            Self::UserDir(b) => Some(b),
            Self::FileHeader(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_entry_mut(&mut self) -> Option<&mut dyn DirEntry> {
        match self {
            Self::UserDir(b) => Some(b),
            Self::FileHeader(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_data_refs(&self) -> Option<&dyn DataRefs> {
        match self {
            Self::FileHeader(b) => Some(b),
            Self::FileList(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_data_refs_mut(&mut self) -> Option<&mut dyn DataRefs> {
        match self {
            Self::FileHeader(b) => Some(b),
            Self::FileList(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&dyn DataBlock> {
        match self {
            Self::DataOfs(b) => Some(b),
            Self::DataFfs(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_data_mut(&mut self) -> Option<&mut dyn DataBlock> {
        match self {
            Self::DataOfs(b) => Some(b),
            Self::DataFfs(b) => Some(b),
            _ => None,
        }
    }
}
