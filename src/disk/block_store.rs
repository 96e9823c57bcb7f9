use crate::{
    disk::types::BlockNr,
    fs::{
        block::Block,
        error::{FileSystemError, Result},
        types::BlockType,
    },
};

/// 块存储的窄接口：Partition / Block 只通过它读写其他块
pub trait BlockStore {
    fn bsize(&self) -> usize;
    fn num_blocks(&self) -> usize;
    fn block(&self, nr: BlockNr) -> Option<&Block>;
    fn block_mut(&mut self, nr: BlockNr) -> Option<&mut Block>;

    /// 用新块替换 `block.nr()` 处的旧块，返回旧块
    fn replace(&mut self, block: Block) -> Result<Block>;

    /// 越界的块号视为 Unknown
    fn block_type(&self, nr: BlockNr) -> BlockType {
        self.block(nr).map_or(BlockType::Unknown, Block::block_type)
    }
}

/// 整个设备的块数组，每个下标上都恰好有一个块
#[derive(Debug, Clone)]
pub struct BlockArray {
    bsize: usize,
    blocks: Vec<Block>,
}

impl BlockArray {
    /// 新建时所有块都是 Empty
    pub fn new(num_blocks: usize, bsize: usize) -> Self {
        let blocks = (0..num_blocks)
            .map(|nr| Block::empty(nr as BlockNr, bsize))
            .collect();
        Self { bsize, blocks }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Block> {
        self.blocks.iter_mut()
    }
}

impl BlockStore for BlockArray {
    fn bsize(&self) -> usize {
        self.bsize
    }

    fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    fn block(&self, nr: BlockNr) -> Option<&Block> {
        self.blocks.get(nr as usize)
    }

    fn block_mut(&mut self, nr: BlockNr) -> Option<&mut Block> {
        self.blocks.get_mut(nr as usize)
    }

    fn replace(&mut self, block: Block) -> Result<Block> {
        let nr = block.nr();
        if block.bsize() != self.bsize {
            return Err(FileSystemError::WrongBlockSize(block.bsize()));
        }
        let slot = self
            .blocks
            .get_mut(nr as usize)
            .ok_or(FileSystemError::OutOfRange(nr))?;
        Ok(std::mem::replace(slot, block))
    }
}
