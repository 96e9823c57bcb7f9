use std::collections::HashSet;
use tracing::{debug, warn};

use crate::{
    disk::{descriptor::PartitionDescriptor, types::BlockNr, BlockStore},
    fs::{
        block::{boot_checksum, Block, DataRefs, DirEntry, FileHeaderBlock, UserDirBlock},
        config::{bits_per_bitmap_block, refs_per_block, BOOT_BLOCKS, OFS_HEADER_SIZE, ROOT_BITMAP_REFS},
        error::{FileSystemError, Result},
        name::FsName,
        types::{BlockType, VolumeType},
    },
};

/// 分区：设备上一段连续的块，构成一个文件系统
///
/// 分区只保存布局信息，块本身归 Device 所有，所有操作都通过 `BlockStore` 进行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub dos: VolumeType,
    pub low_cyl: usize,
    pub high_cyl: usize,
    pub first_block: BlockNr,
    pub last_block: BlockNr,
    pub root_block: BlockNr,
    pub bm_blocks: Vec<BlockNr>,
    pub bm_ext_blocks: Vec<BlockNr>,
    bsize: usize,
}

impl Partition {
    /// 只按描述符建立分区，不改动任何块
    pub fn new(desc: &PartitionDescriptor, heads: usize, sectors: usize, bsize: usize) -> Self {
        Self {
            dos: desc.dos,
            low_cyl: desc.low_cyl,
            high_cyl: desc.high_cyl,
            first_block: desc.first_block(heads, sectors),
            last_block: desc.last_block(heads, sectors),
            root_block: desc.root_block,
            bm_blocks: desc.bm_blocks.clone(),
            bm_ext_blocks: desc.bm_ext_blocks.clone(),
            bsize,
        }
    }

    /// 格式化：引导块、根块、位图块、位图扩展块，其余块置为空闲
    pub fn make_with_format(
        store: &mut dyn BlockStore,
        desc: &PartitionDescriptor,
        heads: usize,
        sectors: usize,
    ) -> Result<Self> {
        let p = Self::new(desc, heads, sectors, store.bsize());
        if p.last_block as usize >= store.num_blocks() {
            return Err(FileSystemError::OutOfRange(p.last_block));
        }

        for nr in p.first_block..=p.last_block {
            store.replace(Block::empty(nr, p.bsize))?;
        }
        for page in 0..BOOT_BLOCKS {
            p.install(store, p.first_block + page, BlockType::Boot)?;
        }
        p.install(store, p.root_block, BlockType::Root)?;
        for &nr in &p.bm_blocks {
            p.install(store, nr, BlockType::Bitmap)?;
        }
        for &nr in &p.bm_ext_blocks {
            p.install(store, nr, BlockType::BitmapExt)?;
        }
        p.link_bitmap_blocks(store)?;

        for nr in p.first_block..=p.last_block {
            if store.block_type(nr) == BlockType::Empty {
                p.mark_as_free(store, nr);
            }
        }
        p.update_boot_checksum(store);

        debug!(
            dos = %p.dos,
            first = p.first_block,
            last = p.last_block,
            root = p.root_block,
            "formatted partition"
        );
        Ok(p)
    }

    fn install(&self, store: &mut dyn BlockStore, nr: BlockNr, ty: BlockType) -> Result<()> {
        let block = Block::make_with_type(self, nr, ty).ok_or(FileSystemError::OutOfRange(nr))?;
        store.replace(block)?;
        Ok(())
    }

    /// 前 25 个位图块引用放在根块，其余依次放进扩展块链
    fn link_bitmap_blocks(&self, store: &mut dyn BlockStore) -> Result<()> {
        let root = self.root_block;
        let (direct, rest) = self
            .bm_blocks
            .split_at(self.bm_blocks.len().min(ROOT_BITMAP_REFS));

        let rb = store
            .block_mut(root)
            .and_then(Block::as_root_mut)
            .ok_or(FileSystemError::Corrupted(format!("block {root} is not a root block")))?;
        for (i, &nr) in direct.iter().enumerate() {
            rb.set_bitmap_block_ref(i, nr);
        }
        rb.set_next_bm_ext_block_ref(self.bm_ext_blocks.first().copied().unwrap_or(0));

        let mut remaining = rest.iter();
        for (i, &ext) in self.bm_ext_blocks.iter().enumerate() {
            let next = self.bm_ext_blocks.get(i + 1).copied().unwrap_or(0);
            let eb = store
                .block_mut(ext)
                .and_then(Block::as_bitmap_ext_mut)
                .ok_or(FileSystemError::Corrupted(format!("block {ext} is not a bitmap extension block")))?;
            for slot in 0..eb.max_refs() {
                match remaining.next() {
                    Some(&nr) => eb.set_bitmap_block_ref(slot, nr),
                    None => break,
                }
            }
            eb.set_next_bm_ext_block_ref(next);
        }
        Ok(())
    }

    pub fn descriptor(&self) -> PartitionDescriptor {
        PartitionDescriptor {
            dos: self.dos,
            low_cyl: self.low_cyl,
            high_cyl: self.high_cyl,
            root_block: self.root_block,
            bm_blocks: self.bm_blocks.clone(),
            bm_ext_blocks: self.bm_ext_blocks.clone(),
        }
    }

    //
    // 容量
    //

    pub fn bsize(&self) -> usize {
        self.bsize
    }

    pub fn num_cyls(&self) -> usize {
        self.high_cyl - self.low_cyl + 1
    }

    pub fn num_blocks(&self) -> usize {
        (self.last_block - self.first_block + 1) as usize
    }

    pub fn num_bytes(&self) -> usize {
        self.num_blocks() * self.bsize
    }

    pub fn free_blocks(&self, store: &dyn BlockStore) -> usize {
        (self.first_block..=self.last_block)
            .filter(|&nr| self.is_free(store, nr))
            .count()
    }

    pub fn used_blocks(&self, store: &dyn BlockStore) -> usize {
        self.num_blocks() - self.free_blocks(store)
    }

    pub fn free_bytes(&self, store: &dyn BlockStore) -> usize {
        self.free_blocks(store) * self.bsize
    }

    pub fn used_bytes(&self, store: &dyn BlockStore) -> usize {
        self.used_blocks(store) * self.bsize
    }

    pub fn in_range(&self, nr: BlockNr) -> bool {
        nr >= self.first_block && nr <= self.last_block
    }

    pub fn is_ofs(&self) -> bool {
        self.dos.is_ofs()
    }

    pub fn is_ffs(&self) -> bool {
        self.dos.is_ffs()
    }

    //
    // 卷名
    //

    pub fn name(&self, store: &dyn BlockStore) -> FsName {
        store
            .block(self.root_block)
            .and_then(Block::as_root)
            .map_or_else(|| FsName::new(""), |rb| rb.name())
    }

    pub fn set_name(&self, store: &mut dyn BlockStore, name: &FsName) {
        if let Some(rb) = store.block_mut(self.root_block).and_then(Block::as_root_mut) {
            rb.set_name(name);
        }
    }

    /// 由位置或类型字推断一个原始块的类型，用于导入镜像
    pub fn predict_block_type(&self, nr: BlockNr, bytes: &[u8]) -> BlockType {
        if !self.in_range(nr) || bytes.len() < 8 {
            return BlockType::Unknown;
        }
        if nr < self.first_block + BOOT_BLOCKS {
            return BlockType::Boot;
        }
        if self.bm_blocks.contains(&nr) {
            return BlockType::Bitmap;
        }
        if self.bm_ext_blocks.contains(&nr) {
            return BlockType::BitmapExt;
        }

        let word = |p: usize| u32::from_be_bytes([bytes[p], bytes[p + 1], bytes[p + 2], bytes[p + 3]]);
        let ty = word(0);
        let subtype = word(bytes.len() - 4) as i32;

        match (ty, subtype) {
            (2, 1) => return BlockType::Root,
            (2, 2) => return BlockType::UserDir,
            (2, -3) => return BlockType::FileHeader,
            (16, -3) => return BlockType::FileList,
            _ => {}
        }

        if self.is_ofs() {
            if ty == 8 {
                return BlockType::DataOfs;
            }
        } else if bytes.iter().any(|&b| b != 0) {
            return BlockType::DataFfs;
        }
        BlockType::Empty
    }

    /// 沿目录树找出文件头和扩展块引用的块，返回它们应有的类型
    ///
    /// 只看内容会把全零或形似文件头的数据块认错，导入后用它修正。
    pub fn referenced_block_types(&self, store: &dyn BlockStore) -> Vec<(BlockNr, BlockType)> {
        let mut found = Vec::new();
        let mut visited = HashSet::from([self.root_block]);
        let mut dirs = vec![self.root_block];

        while let Some(dir) = dirs.pop() {
            let Some(table) = store.block(dir).and_then(Block::as_hash_table) else {
                continue;
            };
            for slot in 0..table.hash_table_size() {
                let mut cur = table.hash_ref(slot);
                while self.in_range(cur) && visited.insert(cur) {
                    let Some(block) = store.block(cur) else {
                        break;
                    };
                    match block.block_type() {
                        BlockType::UserDir => dirs.push(cur),
                        BlockType::FileHeader => self.collect_file_blocks(store, cur, &mut visited, &mut found),
                        _ => break,
                    }
                    cur = block.as_entry().map_or(0, DirEntry::next_hash_ref);
                }
            }
        }
        found
    }

    fn collect_file_blocks(
        &self,
        store: &dyn BlockStore,
        header: BlockNr,
        visited: &mut HashSet<BlockNr>,
        found: &mut Vec<(BlockNr, BlockType)>,
    ) {
        let data_type = if self.is_ofs() { BlockType::DataOfs } else { BlockType::DataFfs };
        let mut cur = header;

        while let Some(refs) = store.block(cur).and_then(Block::as_data_refs) {
            for nr in refs.data_block_refs() {
                if self.is_data_area(nr) && visited.insert(nr) {
                    found.push((nr, data_type));
                }
            }
            let next = refs.next_list_block_ref();
            if !self.is_data_area(next) || !visited.insert(next) {
                break;
            }
            if store.block_type(next) != BlockType::FileList {
                warn!(header, block = next, "file list chain points to a non-list block");
                break;
            }
            cur = next;
        }
    }

    /// 引导块、根块和位图块以外的块
    fn is_data_area(&self, nr: BlockNr) -> bool {
        self.in_range(nr)
            && nr >= self.first_block + BOOT_BLOCKS
            && nr != self.root_block
            && !self.bm_blocks.contains(&nr)
            && !self.bm_ext_blocks.contains(&nr)
    }

    //
    // 容量规划
    //

    pub fn required_data_blocks(&self, file_size: usize) -> usize {
        let per_block = self.bsize - if self.is_ofs() { OFS_HEADER_SIZE } else { 0 };
        file_size.div_ceil(per_block)
    }

    pub fn required_file_list_blocks(&self, file_size: usize) -> usize {
        let num_blocks = self.required_data_blocks(file_size);
        let num_refs = refs_per_block(self.bsize);
        if num_blocks <= num_refs {
            0
        } else {
            (num_blocks - 1) / num_refs
        }
    }

    /// 文件头块 + 数据块 + 扩展块
    pub fn required_blocks(&self, file_size: usize) -> usize {
        1 + self.required_data_blocks(file_size) + self.required_file_list_blocks(file_size)
    }

    //
    // 分配
    //

    /// 先在根块之上找空块，再往下找；失败返回 0
    pub fn allocate_block(&self, store: &mut dyn BlockStore) -> BlockNr {
        let above = (self.root_block + 1)..=self.last_block;
        let below = (self.first_block..self.root_block).rev();

        match above.chain(below).find(|&nr| store.block_type(nr) == BlockType::Empty) {
            Some(nr) => {
                self.mark_as_allocated(store, nr);
                nr
            }
            None => {
                warn!(first = self.first_block, last = self.last_block, "no free blocks left");
                0
            }
        }
    }

    /// 把块替换为 Empty 并在位图中标记为空闲
    pub fn deallocate_block(&self, store: &mut dyn BlockStore, nr: BlockNr) -> Result<()> {
        if !self.in_range(nr) {
            return Err(FileSystemError::OutOfRange(nr));
        }
        store.replace(Block::empty(nr, self.bsize))?;
        self.mark_as_free(store, nr);
        Ok(())
    }

    /// 分配一个文件扩展块并挂在 `prev` 后面
    pub fn add_file_list_block(
        &self,
        store: &mut dyn BlockStore,
        head: BlockNr,
        prev: BlockNr,
    ) -> Result<BlockNr> {
        if store.block(prev).and_then(Block::as_data_refs).is_none() {
            return Err(FileSystemError::Corrupted(format!("block {prev} has no data block references")));
        }
        let nr = self.allocate_block(store);
        if nr == 0 {
            return Err(FileSystemError::DiskFull);
        }

        let mut block = Block::make_with_type(self, nr, BlockType::FileList)
            .ok_or(FileSystemError::OutOfRange(nr))?;
        if let Some(fl) = block.as_file_list_mut() {
            fl.set_file_header_ref(head);
        }
        store.replace(block)?;

        if let Some(p) = store.block_mut(prev).and_then(Block::as_data_refs_mut) {
            p.set_next_list_block_ref(nr);
        }
        Ok(nr)
    }

    /// 分配第 `seq` 个数据块；OFS 下把它接到 `prev` 数据块后面
    pub fn add_data_block(
        &self,
        store: &mut dyn BlockStore,
        seq: u32,
        head: BlockNr,
        prev: BlockNr,
    ) -> Result<BlockNr> {
        if store.block(prev).is_none() {
            return Err(FileSystemError::OutOfRange(prev));
        }
        let nr = self.allocate_block(store);
        if nr == 0 {
            return Err(FileSystemError::DiskFull);
        }

        let ty = if self.is_ofs() { BlockType::DataOfs } else { BlockType::DataFfs };
        let mut block = Block::make_with_type(self, nr, ty).ok_or(FileSystemError::OutOfRange(nr))?;
        if let Some(data) = block.as_ofs_data_mut() {
            data.set_data_block_nr(seq);
            data.set_file_header_ref(head);
        }
        store.replace(block)?;

        if let Some(p) = store.block_mut(prev).and_then(Block::as_ofs_data_mut) {
            p.set_next_data_block_ref(nr);
        }
        Ok(nr)
    }

    pub fn new_user_dir_block(&self, store: &mut dyn BlockStore, name: &FsName) -> Result<BlockNr> {
        let nr = self.allocate_block(store);
        if nr == 0 {
            return Err(FileSystemError::DiskFull);
        }
        store.replace(Block::UserDir(UserDirBlock::with_name(nr, self.bsize, name)))?;
        Ok(nr)
    }

    pub fn new_file_header_block(&self, store: &mut dyn BlockStore, name: &FsName) -> Result<BlockNr> {
        let nr = self.allocate_block(store);
        if nr == 0 {
            return Err(FileSystemError::DiskFull);
        }
        store.replace(Block::FileHeader(FileHeaderBlock::with_name(nr, self.bsize, name)))?;
        Ok(nr)
    }

    /// 给空文件头写入数据：先挂扩展块，再逐个分配数据块并登记引用
    pub fn add_data(&self, store: &mut dyn BlockStore, header: BlockNr, bytes: &[u8]) -> Result<usize> {
        let num_data = self.required_data_blocks(bytes.len());
        let num_lists = self.required_file_list_blocks(bytes.len());
        debug!(header, num_data, num_lists, "adding file data");

        if self.free_blocks(store) < num_data + num_lists {
            warn!(header, "not enough free blocks");
            return Err(FileSystemError::DiskFull);
        }

        let mut prev = header;
        for _ in 0..num_lists {
            prev = self.add_file_list_block(store, header, prev)?;
        }

        let mut prev = header;
        let mut written = 0;
        for (seq, chunk) in (1u32..).zip(bytes.chunks(self.data_capacity())) {
            let nr = self.add_data_block(store, seq, header, prev)?;
            self.add_data_block_ref(store, header, nr)?;

            if let Some(data) = store.block_mut(nr).and_then(Block::as_data_mut) {
                written += data.write_payload(chunk);
            }
            if let Some(fh) = store.block_mut(header).and_then(Block::as_file_header_mut) {
                fh.set_file_size(written);
            }
            prev = nr;
        }
        Ok(written)
    }

    fn data_capacity(&self) -> usize {
        self.bsize - if self.is_ofs() { OFS_HEADER_SIZE } else { 0 }
    }

    /// 把数据块引用登记到文件头或第一个有空位的扩展块
    fn add_data_block_ref(&self, store: &mut dyn BlockStore, header: BlockNr, nr: BlockNr) -> Result<()> {
        // 扩展块第 4 个字记录的是整个文件的第一个数据块
        let first = store
            .block(header)
            .and_then(Block::as_data_refs)
            .map(|refs| refs.first_data_block_ref())
            .filter(|&first| first != 0)
            .unwrap_or(nr);

        let mut visited = HashSet::new();
        let mut cur = header;

        while cur != 0 {
            if !visited.insert(cur) {
                return Err(FileSystemError::HasCycles);
            }
            let refs = store
                .block_mut(cur)
                .and_then(Block::as_data_refs_mut)
                .ok_or_else(|| FileSystemError::Corrupted(format!("block {cur} has no data block references")))?;
            if refs.add_data_block_ref(first, nr) {
                return Ok(());
            }
            cur = refs.next_list_block_ref();
        }
        Err(FileSystemError::DiskFull)
    }

    //
    // 位图
    //

    /// 定位块 `nr` 的分配位：(位图块号, 字节, 位)
    ///
    /// 分区内前两个块不在位图中。每个位图块的前 4 字节是校验和，
    /// 位按大端长字排列，因此字节位置在 4 字节组内要倒序。
    pub fn locate_allocation_bit(&self, nr: BlockNr) -> Option<(BlockNr, usize, usize)> {
        if !self.in_range(nr) {
            return None;
        }
        let rel = (nr - self.first_block) as usize;
        if rel < BOOT_BLOCKS as usize {
            return None;
        }
        let rel = rel - BOOT_BLOCKS as usize;

        let bits_per_block = bits_per_bitmap_block(self.bsize);
        let index = rel / bits_per_block;
        let rel = rel % bits_per_block;

        let Some(&bm) = self.bm_blocks.get(index) else {
            warn!(nr, index, "allocation bit is located in a non-existent bitmap block");
            return None;
        };

        let mut byte = rel / 8;
        byte = match byte % 4 {
            0 => byte + 3,
            1 => byte + 1,
            2 => byte - 1,
            _ => byte - 3,
        };
        Some((bm, byte + 4, rel % 8))
    }

    pub fn is_free(&self, store: &dyn BlockStore, nr: BlockNr) -> bool {
        self.locate_allocation_bit(nr)
            .and_then(|(bm, byte, bit)| {
                store
                    .block(bm)
                    .and_then(Block::as_bitmap)
                    .map(|b| b.bit(byte, bit))
            })
            .unwrap_or(false)
    }

    pub fn mark_as_allocated(&self, store: &mut dyn BlockStore, nr: BlockNr) {
        self.set_allocation_bit(store, nr, false);
    }

    pub fn mark_as_free(&self, store: &mut dyn BlockStore, nr: BlockNr) {
        self.set_allocation_bit(store, nr, true);
    }

    fn set_allocation_bit(&self, store: &mut dyn BlockStore, nr: BlockNr, value: bool) {
        if let Some((bm, byte, bit)) = self.locate_allocation_bit(nr) {
            if let Some(b) = store.block_mut(bm).and_then(Block::as_bitmap_mut) {
                b.set_bit(byte, bit, value);
            }
        }
    }

    //
    // 引导块
    //

    pub fn boot_checksum(&self, store: &dyn BlockStore) -> Option<u32> {
        let b0 = store.block(self.first_block).and_then(Block::as_boot)?;
        let b1 = store.block(self.first_block + 1).and_then(Block::as_boot)?;
        Some(boot_checksum(b0, b1))
    }

    pub fn update_boot_checksum(&self, store: &mut dyn BlockStore) {
        if let Some(sum) = self.boot_checksum(store) {
            if let Some(b0) = store.block_mut(self.first_block) {
                b0.set32(1, sum);
            }
        }
    }

    /// 写入标准引导代码
    pub fn make_bootable(&self, store: &mut dyn BlockStore) -> Result<()> {
        if !self.dos.is_supported() {
            return Err(FileSystemError::Unsupported(self.dos.to_string()));
        }
        for nr in self.first_block..self.first_block + BOOT_BLOCKS {
            let b = store
                .block_mut(nr)
                .and_then(Block::as_boot_mut)
                .ok_or_else(|| FileSystemError::Corrupted(format!("block {nr} is not a boot block")))?;
            b.write_boot_code(self.dos);
        }
        self.update_boot_checksum(store);
        Ok(())
    }

    /// 用标准引导代码覆盖引导块；不支持的格式直接清空
    pub fn kill_virus(&self, store: &mut dyn BlockStore) -> Result<()> {
        if self.dos.is_supported() {
            return self.make_bootable(store);
        }
        for nr in self.first_block..self.first_block + BOOT_BLOCKS {
            if let Some(b) = store.block_mut(nr).and_then(Block::as_boot_mut) {
                b.clear();
            }
        }
        self.update_boot_checksum(store);
        Ok(())
    }

    /// 位图与块类型不一致的块数
    pub fn check(&self, store: &dyn BlockStore) -> usize {
        let mut errors = 0;
        for nr in self.first_block..=self.last_block {
            let empty = store.block_type(nr) == BlockType::Empty;
            let free = self.is_free(store, nr);
            if empty && !free {
                debug!(nr, "empty block is marked as allocated");
                errors += 1;
            }
            if !empty && free {
                debug!(nr, "non-empty block is marked as free");
                errors += 1;
            }
        }
        errors
    }

    /// 文件头或目录项的父目录（用于 getPath 等遍历）
    pub(crate) fn parent_of(store: &dyn BlockStore, nr: BlockNr) -> Option<BlockNr> {
        store
            .block(nr)
            .and_then(Block::as_entry)
            .map(DirEntry::parent_dir_ref)
    }
}
