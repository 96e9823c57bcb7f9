use std::collections::HashSet;
use tracing::{debug, info, trace, warn};

use crate::{
    disk::{
        descriptor::DeviceDescriptor,
        image::DiskImage,
        types::{BlockNr, DiskDensity, DiskDiameter},
        BlockArray, BlockStore,
    },
    fs::{
        block::{Block, DataRefs, DirEntry},
        error::{BlockError, FileSystemError, Result},
        name::FsName,
        partition::Partition,
        report::ErrorReport,
        types::{BlockType, ItemType, VolumeType},
    },
};

/// 目录列表中的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub nr: BlockNr,
    /// 相对于当前目录的路径
    pub path: String,
    pub is_dir: bool,
    pub size: usize,
}

/// 整个磁盘：块数组 + 分区表 + 当前目录
///
/// 块之间只用块号互相引用，所有引用都通过这里的块数组解析。
#[derive(Debug, Clone)]
pub struct Device {
    num_cyls: usize,
    num_heads: usize,
    num_sectors: usize,
    blocks: BlockArray,
    partitions: Vec<Partition>,
    cp: usize,
    cd: BlockNr,
}

impl Device {
    //
    // 构造
    //

    /// 按布局格式化一个新设备
    pub fn make_with_format(desc: &DeviceDescriptor) -> Result<Self> {
        desc.validate()?;

        let mut blocks = BlockArray::new(desc.num_blocks, desc.bsize);
        let partitions = desc
            .partitions
            .iter()
            .map(|p| Partition::make_with_format(&mut blocks, p, desc.num_heads, desc.num_sectors))
            .collect::<Result<Vec<_>>>()?;
        let cd = partitions[0].root_block;

        info!(
            cyls = desc.num_cyls,
            heads = desc.num_heads,
            sectors = desc.num_sectors,
            blocks = desc.num_blocks,
            "device formatted"
        );
        let mut device = Self {
            num_cyls: desc.num_cyls,
            num_heads: desc.num_heads,
            num_sectors: desc.num_sectors,
            blocks,
            partitions,
            cp: 0,
            cd,
        };
        device.update_checksums();
        Ok(device)
    }

    /// 标准软盘
    pub fn make_with_floppy(
        diameter: DiskDiameter,
        density: DiskDensity,
        dos: VolumeType,
    ) -> Result<Self> {
        Self::make_with_format(&DeviceDescriptor::floppy(diameter, density, dos)?)
    }

    /// 按给定布局建立设备并导入原始字节
    pub fn make_with_layout(desc: &DeviceDescriptor, bytes: &[u8]) -> Result<Self> {
        let mut device = Self::make_with_format(desc)?;
        device.import_volume(bytes)?;
        Ok(device)
    }

    /// 从 ADF / HDF 镜像建立设备
    pub fn make_with_image(image: &dyn DiskImage) -> Result<Self> {
        Self::make_with_layout(&image.layout()?, image.data())
    }

    /// 当前布局，可另存为 sidecar 文件
    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            num_cyls: self.num_cyls,
            num_heads: self.num_heads,
            num_sectors: self.num_sectors,
            num_reserved: crate::disk::types::RESERVED_BLOCKS,
            bsize: self.bsize(),
            num_blocks: self.num_blocks(),
            partitions: self.partitions.iter().map(Partition::descriptor).collect(),
        }
    }

    //
    // 几何参数
    //

    pub fn num_cyls(&self) -> usize {
        self.num_cyls
    }

    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    pub fn num_sectors(&self) -> usize {
        self.num_sectors
    }

    pub fn num_tracks(&self) -> usize {
        self.num_cyls * self.num_heads
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.num_blocks()
    }

    pub fn bsize(&self) -> usize {
        self.blocks.bsize()
    }

    /// 容量（字节）
    pub fn num_bytes(&self) -> usize {
        self.num_blocks() * self.bsize()
    }

    //
    // 分区
    //

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn current_partition(&self) -> &Partition {
        &self.partitions[self.cp]
    }

    pub fn select_partition(&mut self, index: usize) -> Result<()> {
        let p = self
            .partitions
            .get(index)
            .ok_or_else(|| FileSystemError::NotFound(format!("partition {index}")))?;
        self.cd = p.root_block;
        self.cp = index;
        Ok(())
    }

    pub fn partition_for_block(&self, nr: BlockNr) -> Option<usize> {
        self.partitions.iter().position(|p| p.in_range(nr))
    }

    pub fn name(&self) -> FsName {
        self.current_partition().name(&self.blocks)
    }

    pub fn set_name(&mut self, name: &FsName) {
        self.partitions[self.cp].set_name(&mut self.blocks, name);
        self.update_checksums();
    }

    pub fn dos(&self) -> VolumeType {
        self.current_partition().dos
    }

    pub fn free_blocks(&self) -> usize {
        self.current_partition().free_blocks(&self.blocks)
    }

    pub fn used_blocks(&self) -> usize {
        self.current_partition().used_blocks(&self.blocks)
    }

    pub fn free_bytes(&self) -> usize {
        self.current_partition().free_bytes(&self.blocks)
    }

    pub fn used_bytes(&self) -> usize {
        self.current_partition().used_bytes(&self.blocks)
    }

    pub fn make_bootable(&mut self) -> Result<()> {
        self.partitions[self.cp].make_bootable(&mut self.blocks)
    }

    pub fn kill_virus(&mut self) -> Result<()> {
        self.partitions[self.cp].kill_virus(&mut self.blocks)
    }

    //
    // 块访问
    //

    pub fn block(&self, nr: BlockNr) -> Option<&Block> {
        self.blocks.block(nr)
    }

    pub fn block_mut(&mut self, nr: BlockNr) -> Option<&mut Block> {
        self.blocks.block_mut(nr)
    }

    pub fn block_type(&self, nr: BlockNr) -> BlockType {
        self.blocks.block_type(nr)
    }

    pub fn item_type(&self, nr: BlockNr, byte: usize) -> ItemType {
        self.block(nr).map_or(ItemType::Unknown, |b| b.item_type(byte))
    }

    pub fn read_byte(&self, nr: BlockNr, byte: usize) -> Option<u8> {
        self.block(nr).and_then(|b| b.data().get(byte).copied())
    }

    /// 修正所有块的校验和（包括引导块）
    pub fn update_checksums(&mut self) {
        for block in self.blocks.iter_mut() {
            block.update_checksum();
        }
        for p in &self.partitions {
            p.update_boot_checksum(&mut self.blocks);
        }
    }

    //
    // 目录导航
    //

    /// 当前目录；若记录的块号已失效则回到根目录
    pub fn current_dir(&self) -> BlockNr {
        let root = self.current_partition().root_block;
        if self.current_partition().in_range(self.cd) && self.block_type(self.cd).is_directory() {
            self.cd
        } else {
            root
        }
    }

    pub fn current_dir_block(&self) -> Option<&Block> {
        self.block(self.current_dir())
    }

    /// 支持 "/"、".."、"." 以及以 '/' 分隔的多级路径
    pub fn change_dir(&mut self, path: &str) -> Result<BlockNr> {
        let root = self.current_partition().root_block;
        let mut cd = if path.starts_with('/') {
            root
        } else {
            self.current_dir()
        };

        for component in path.split('/').filter(|c| !c.is_empty()) {
            cd = match component {
                "." => cd,
                ".." => match Partition::parent_of(&self.blocks, cd) {
                    Some(parent) if self.block_type(parent).is_directory() => parent,
                    _ => root,
                },
                name => match self.seek_ref_in(cd, &FsName::new(name))? {
                    0 => return Err(FileSystemError::NotFound(name.to_string())),
                    nr if self.block_type(nr) == BlockType::UserDir => nr,
                    _ => return Err(FileSystemError::NotADirectory(name.to_string())),
                },
            };
        }

        self.cd = cd;
        Ok(cd)
    }

    /// 从根目录到 `nr` 的路径，不含根目录本身
    pub fn get_path(&self, nr: BlockNr) -> String {
        let mut names = Vec::new();
        let mut visited = HashSet::new();
        let mut cur = nr;

        while let Some(entry) = self.block(cur).and_then(Block::as_entry) {
            if !visited.insert(cur) {
                warn!(block = cur, "parent chain has cycles");
                break;
            }
            names.push(entry.name().to_string());
            cur = entry.parent_dir_ref();
        }
        names.reverse();
        names.join("/")
    }

    /// 在当前目录中按名字查找；找不到返回 0
    pub fn seek_ref(&self, name: &FsName) -> BlockNr {
        self.seek_ref_in(self.current_dir(), name).unwrap_or_else(|e| {
            warn!(name = %name, error = %e, "lookup failed");
            0
        })
    }

    pub fn seek_dir(&self, name: &FsName) -> BlockNr {
        match self.seek_ref(name) {
            nr if self.block_type(nr) == BlockType::UserDir => nr,
            _ => 0,
        }
    }

    pub fn seek_file(&self, name: &FsName) -> BlockNr {
        match self.seek_ref(name) {
            nr if self.block_type(nr) == BlockType::FileHeader => nr,
            _ => 0,
        }
    }

    fn seek_ref_in(&self, dir: BlockNr, name: &FsName) -> Result<BlockNr> {
        let Some(table) = self.block(dir).and_then(Block::as_hash_table) else {
            return Ok(0);
        };
        let slot = name.hash_value() as usize % table.hash_table_size();

        let mut visited = HashSet::new();
        let mut nr = table.hash_ref(slot);
        while let Some(entry) = self.block(nr).and_then(Block::as_entry) {
            if !visited.insert(nr) {
                return Err(FileSystemError::HasCycles);
            }
            if entry.name() == *name {
                return Ok(nr);
            }
            nr = entry.next_hash_ref();
        }
        Ok(0)
    }

    /// 把块挂进当前目录的哈希表；槽位已占用时接到链尾
    pub fn add_hash_ref(&mut self, nr: BlockNr) -> Result<()> {
        self.add_hash_ref_in(self.current_dir(), nr)
    }

    fn add_hash_ref_in(&mut self, dir: BlockNr, nr: BlockNr) -> Result<()> {
        let hash = self
            .block(nr)
            .and_then(Block::hash_value)
            .ok_or_else(|| FileSystemError::Corrupted(format!("block {nr} is not hashable")))?;
        let table = self
            .block(dir)
            .and_then(Block::as_hash_table)
            .ok_or_else(|| FileSystemError::NotADirectory(self.get_path(dir)))?;
        let slot = hash as usize % table.hash_table_size();

        match table.hash_ref(slot) {
            0 => {
                if let Some(t) = self.blocks.block_mut(dir).and_then(Block::as_hash_table_mut) {
                    t.set_hash_ref(slot, nr);
                }
            }
            first => {
                let last = self.last_hash_block_in_chain(first)?;
                if let Some(e) = self.blocks.block_mut(last).and_then(Block::as_entry_mut) {
                    e.set_next_hash_ref(nr);
                }
            }
        }
        Ok(())
    }

    /// 哈希链的最后一个块
    pub fn last_hash_block_in_chain(&self, start: BlockNr) -> Result<BlockNr> {
        let mut visited = HashSet::new();
        let mut last = start;
        let mut nr = start;

        while let Some(entry) = self.block(nr).and_then(Block::as_entry) {
            if !visited.insert(nr) {
                return Err(FileSystemError::HasCycles);
            }
            last = nr;
            nr = entry.next_hash_ref();
        }
        Ok(last)
    }

    /// 文件扩展块链的最后一个块（可能就是文件头本身）
    pub fn last_file_list_block_in_chain(&self, start: BlockNr) -> Result<BlockNr> {
        let mut visited = HashSet::new();
        let mut last = start;
        let mut nr = start;

        while let Some(refs) = self.block(nr).and_then(Block::as_data_refs) {
            if !visited.insert(nr) {
                return Err(FileSystemError::HasCycles);
            }
            last = nr;
            nr = refs.next_list_block_ref();
        }
        Ok(last)
    }

    //
    // 遍历
    //

    /// 收集目录下的所有项，按哈希槽和链内顺序；`recursive` 时深度优先展开子目录
    pub fn collect(&self, dir: BlockNr, recursive: bool) -> Result<Vec<BlockNr>> {
        let mut result = Vec::new();
        let mut remaining = Vec::new();
        let mut visited = HashSet::new();

        self.collect_hashed_refs(dir, &mut remaining, &mut visited)?;

        while let Some(nr) = remaining.pop() {
            result.push(nr);
            if recursive && self.block_type(nr) == BlockType::UserDir {
                self.collect_hashed_refs(nr, &mut remaining, &mut visited)?;
            }
        }
        Ok(result)
    }

    /// 按槽位倒序压栈，弹出时就是正序
    fn collect_hashed_refs(
        &self,
        dir: BlockNr,
        stack: &mut Vec<BlockNr>,
        visited: &mut HashSet<BlockNr>,
    ) -> Result<()> {
        let Some(table) = self.block(dir).and_then(Block::as_hash_table) else {
            return Ok(());
        };
        for slot in (0..table.hash_table_size()).rev() {
            self.collect_refs_with_same_hash_value(table.hash_ref(slot), stack, visited)?;
        }
        Ok(())
    }

    fn collect_refs_with_same_hash_value(
        &self,
        first: BlockNr,
        stack: &mut Vec<BlockNr>,
        visited: &mut HashSet<BlockNr>,
    ) -> Result<()> {
        let mut chain = Vec::new();
        let mut nr = first;

        while let Some(entry) = self.block(nr).and_then(Block::as_entry) {
            if !visited.insert(nr) {
                warn!(block = nr, "hash chain has cycles");
                return Err(FileSystemError::HasCycles);
            }
            chain.push(nr);
            nr = entry.next_hash_ref();
        }
        stack.extend(chain.into_iter().rev());
        Ok(())
    }

    /// 当前目录的内容，按路径排序
    pub fn list_directory(&self, recursive: bool) -> Result<Vec<ListItem>> {
        let cd = self.current_dir();
        let prefix = self.path_prefix(cd);

        let mut items = self
            .collect(cd, recursive)?
            .into_iter()
            .map(|nr| {
                let path = self.get_path(nr);
                ListItem {
                    nr,
                    path: path.strip_prefix(&prefix).unwrap_or(&path).to_string(),
                    is_dir: self.block_type(nr) == BlockType::UserDir,
                    size: self
                        .block(nr)
                        .and_then(Block::as_file_header)
                        .map_or(0, |fh| fh.file_size()),
                }
            })
            .collect::<Vec<_>>();
        items.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(items)
    }

    /// 目录 `dir` 下各项路径的公共前缀（根目录为空）
    pub(crate) fn path_prefix(&self, dir: BlockNr) -> String {
        match self.get_path(dir) {
            p if p.is_empty() => p,
            p => p + "/",
        }
    }

    //
    // 创建
    //

    pub fn make_dir(&mut self, name: &str) -> Result<BlockNr> {
        let name = FsName::new(name);
        let cd = self.current_dir();
        if self.seek_ref_in(cd, &name)? != 0 {
            return Err(FileSystemError::AlreadyExists(name.to_string()));
        }

        let nr = self.partitions[self.cp].new_user_dir_block(&mut self.blocks, &name)?;
        if let Some(e) = self.blocks.block_mut(nr).and_then(Block::as_entry_mut) {
            e.set_parent_dir_ref(cd);
        }
        self.add_hash_ref_in(cd, nr)?;
        self.update_checksums();

        debug!(name = %name, block = nr, parent = cd, "directory created");
        Ok(nr)
    }

    /// 新建文件并写入数据；空间不足时不做任何修改
    pub fn make_file(&mut self, name: &str, bytes: &[u8]) -> Result<BlockNr> {
        let name = FsName::new(name);
        let cd = self.current_dir();
        if self.seek_ref_in(cd, &name)? != 0 {
            return Err(FileSystemError::AlreadyExists(name.to_string()));
        }

        let p = &self.partitions[self.cp];
        let required = p.required_blocks(bytes.len());
        if required > p.free_blocks(&self.blocks) {
            warn!(name = %name, required, "not enough space for file");
            return Err(FileSystemError::DiskFull);
        }

        let nr = p.new_file_header_block(&mut self.blocks, &name)?;
        if let Some(e) = self.blocks.block_mut(nr).and_then(Block::as_entry_mut) {
            e.set_parent_dir_ref(cd);
        }
        self.add_hash_ref_in(cd, nr)?;
        self.partitions[self.cp].add_data(&mut self.blocks, nr, bytes)?;
        self.update_checksums();

        debug!(name = %name, block = nr, size = bytes.len(), "file created");
        Ok(nr)
    }

    /// 按文件头和扩展块链重新拼出文件内容
    pub fn read_file(&self, nr: BlockNr) -> Result<Vec<u8>> {
        let header = self
            .block(nr)
            .and_then(Block::as_file_header)
            .ok_or_else(|| FileSystemError::NotAFile(self.get_path(nr)))?;

        let size = header.file_size();
        let mut bytes = Vec::with_capacity(size);
        let mut visited = HashSet::new();
        let mut cur = nr;

        while bytes.len() < size {
            let Some(refs) = self.block(cur).and_then(Block::as_data_refs) else {
                break;
            };
            if !visited.insert(cur) {
                return Err(FileSystemError::HasCycles);
            }
            for data_ref in refs.data_block_refs() {
                let data = self
                    .block(data_ref)
                    .and_then(Block::as_data)
                    .ok_or_else(|| {
                        FileSystemError::Corrupted(format!("block {data_ref} is not a data block"))
                    })?;
                bytes.extend_from_slice(data.payload(size - bytes.len()));
                if bytes.len() >= size {
                    break;
                }
            }
            cur = refs.next_list_block_ref();
        }

        if bytes.len() < size {
            warn!(block = nr, expected = size, actual = bytes.len(), "file is truncated");
        }
        Ok(bytes)
    }

    //
    // 导入 / 导出
    //

    /// 用原始字节替换整个块数组；任何检查失败都不会修改设备
    pub fn import_volume(&mut self, src: &[u8]) -> Result<()> {
        let bsize = self.bsize();
        if src.len() % bsize != 0 {
            return Err(FileSystemError::WrongBlockSize(src.len()));
        }
        if src.len() != self.num_bytes() {
            return Err(FileSystemError::WrongCapacity {
                expected: self.num_bytes(),
                actual: src.len(),
            });
        }
        if let Some(p) = self.partitions.iter().find(|p| !p.dos.is_supported()) {
            return Err(FileSystemError::Unsupported(p.dos.to_string()));
        }

        let mut staged = BlockArray::new(self.num_blocks(), bsize);
        for (i, chunk) in src.chunks_exact(bsize).enumerate() {
            let nr = i as BlockNr;
            let mut block = self
                .partition_for_block(nr)
                .map(|i| &self.partitions[i])
                .and_then(|p| Block::make_with_type(p, nr, p.predict_block_type(nr, chunk)))
                .unwrap_or_else(|| Block::empty(nr, bsize));
            block.import_block(chunk)?;
            staged.replace(block)?;
        }

        // 被文件引用的数据块以目录树为准，不以内容推断为准
        for p in &self.partitions {
            for (nr, ty) in p.referenced_block_types(&staged) {
                if staged.block_type(nr) == ty {
                    continue;
                }
                if let Some(mut block) = Block::make_with_type(p, nr, ty) {
                    let offset = nr as usize * bsize;
                    block.import_block(&src[offset..offset + bsize])?;
                    trace!(block = nr, ty = %ty, "block type taken from its file");
                    staged.replace(block)?;
                }
            }
        }

        self.blocks = staged;
        self.cp = 0;
        self.cd = self.partitions[0].root_block;

        info!(blocks = self.num_blocks(), "volume imported");
        Ok(())
    }

    /// 导出整个设备
    pub fn export_volume(&mut self, dst: &mut [u8]) -> Result<()> {
        let last = self.num_blocks().saturating_sub(1) as BlockNr;
        self.export_blocks(0, last, dst)
    }

    pub fn export_block(&mut self, nr: BlockNr, dst: &mut [u8]) -> Result<()> {
        self.export_blocks(nr, nr, dst)
    }

    /// 导出 `first..=last`，导出前先修正校验和
    pub fn export_blocks(&mut self, first: BlockNr, last: BlockNr, dst: &mut [u8]) -> Result<()> {
        if first > last || last as usize >= self.num_blocks() {
            return Err(FileSystemError::OutOfRange(last));
        }
        let bsize = self.bsize();
        let count = (last - first + 1) as usize;
        if dst.len() != count * bsize {
            return Err(FileSystemError::WrongCapacity {
                expected: count * bsize,
                actual: dst.len(),
            });
        }

        for p in &self.partitions {
            p.update_boot_checksum(&mut self.blocks);
        }
        dst.fill(0);
        for (nr, chunk) in (first..=last).zip(dst.chunks_exact_mut(bsize)) {
            if let Some(block) = self.blocks.block_mut(nr) {
                block.export_block(chunk)?;
            }
        }
        debug!(first, last, "blocks exported");
        Ok(())
    }

    //
    // 检查
    //

    /// 位图一致性 + 每个块的字段检查，不修改设备
    pub fn check(&self, strict: bool) -> ErrorReport {
        let bitmap_errors = self
            .partitions
            .iter()
            .map(|p| p.check(&self.blocks))
            .sum::<usize>();

        let corrupted = self
            .blocks
            .iter()
            .filter(|b| b.check(strict, &self.blocks) > 0)
            .map(Block::nr)
            .collect::<Vec<_>>();

        if !corrupted.is_empty() || bitmap_errors > 0 {
            warn!(bitmap_errors, corrupted = corrupted.len(), "file system check found errors");
        }
        ErrorReport::new(bitmap_errors, corrupted)
    }

    /// 单个块中出错的字节数
    pub fn check_block(&self, nr: BlockNr, strict: bool) -> usize {
        self.block(nr).map_or(0, |b| b.check(strict, &self.blocks))
    }

    pub fn check_byte(
        &self,
        nr: BlockNr,
        byte: usize,
        strict: bool,
    ) -> std::result::Result<(), BlockError> {
        match self.block(nr) {
            Some(b) => b.check_byte(byte, strict, &self.blocks),
            None => Err(BlockError::PtrOutOfRange),
        }
    }
}

impl BlockStore for Device {
    fn bsize(&self) -> usize {
        self.blocks.bsize()
    }

    fn num_blocks(&self) -> usize {
        self.blocks.num_blocks()
    }

    fn block(&self, nr: BlockNr) -> Option<&Block> {
        self.blocks.block(nr)
    }

    fn block_mut(&mut self, nr: BlockNr) -> Option<&mut Block> {
        self.blocks.block_mut(nr)
    }

    fn replace(&mut self, block: Block) -> Result<Block> {
        self.blocks.replace(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dd(dos: VolumeType) -> Device {
        Device::make_with_floppy(DiskDiameter::Inch35, DiskDensity::Dd, dos).unwrap()
    }

    #[test]
    fn geometry() {
        let device = dd(VolumeType::Ofs);
        assert_eq!(device.num_cyls(), 80);
        assert_eq!(device.num_heads(), 2);
        assert_eq!(device.num_sectors(), 11);
        assert_eq!(device.num_tracks(), 160);
        assert_eq!(device.num_blocks(), 1760);
        assert_eq!(device.num_bytes(), 901_120);
        assert_eq!(device.partition_for_block(1759), Some(0));
        assert_eq!(device.partition_for_block(1760), None);
        assert_eq!(device.current_dir(), 880);
    }

    #[test]
    fn change_dir_navigation() {
        let mut device = dd(VolumeType::Ffs);
        let games = device.make_dir("games").unwrap();
        device.change_dir("games").unwrap();
        let arcade = device.make_dir("arcade").unwrap();

        assert_eq!(device.change_dir("arcade").unwrap(), arcade);
        assert_eq!(device.change_dir("..").unwrap(), games);
        assert_eq!(device.change_dir("/").unwrap(), 880);
        assert_eq!(device.change_dir("/games/arcade").unwrap(), arcade);
        assert_eq!(device.change_dir("..").unwrap(), games);
        assert_eq!(device.change_dir("..").unwrap(), 880);
        assert_eq!(device.change_dir("..").unwrap(), 880);

        assert!(matches!(
            device.change_dir("nothing"),
            Err(FileSystemError::NotFound(_))
        ));
        assert_eq!(device.current_dir(), 880);
    }

    #[test]
    fn change_dir_into_file_fails() {
        let mut device = dd(VolumeType::Ofs);
        device.make_file("readme", b"hi").unwrap();
        assert!(matches!(
            device.change_dir("readme"),
            Err(FileSystemError::NotADirectory(_))
        ));
    }

    #[test]
    fn invalid_current_dir_falls_back_to_root() {
        let mut device = dd(VolumeType::Ofs);
        let games = device.make_dir("games").unwrap();
        device.change_dir("games").unwrap();
        device.partitions[0]
            .deallocate_block(&mut device.blocks, games)
            .unwrap();
        assert_eq!(device.current_dir(), 880);
    }

    #[test]
    fn names_are_case_insensitive() {
        let mut device = dd(VolumeType::Ofs);
        let nr = device.make_file("ReadMe", b"x").unwrap();
        assert_eq!(device.seek_ref(&FsName::new("README")), nr);
        assert_eq!(device.seek_file(&FsName::new("readme")), nr);
        assert_eq!(device.seek_dir(&FsName::new("readme")), 0);
        assert!(matches!(
            device.make_dir("README"),
            Err(FileSystemError::AlreadyExists(_))
        ));
    }

    #[test]
    fn list_directory_is_relative_to_current_dir() {
        let mut device = dd(VolumeType::Ffs);
        device.make_dir("s").unwrap();
        device.change_dir("s").unwrap();
        device.make_file("startup", b"echo").unwrap();
        device.change_dir("/").unwrap();
        device.make_file("c", b"").unwrap();

        let paths: Vec<_> = device
            .list_directory(true)
            .unwrap()
            .into_iter()
            .map(|i| i.path)
            .collect();
        assert_eq!(paths, vec!["c", "s", "s/startup"]);

        device.change_dir("s").unwrap();
        let items = device.list_directory(false).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].path, "startup");
        assert_eq!(items[0].size, 4);
        assert!(!items[0].is_dir);
    }

    #[test]
    fn last_file_list_block() {
        let mut device = dd(VolumeType::Ffs);
        let nr = device.make_file("big", &vec![7; 80 * 512]).unwrap();
        let last = device.last_file_list_block_in_chain(nr).unwrap();
        assert_eq!(device.block_type(last), BlockType::FileList);
        assert_eq!(
            device.block(last).and_then(Block::as_file_list).unwrap().file_header_ref(),
            nr
        );
    }

    #[test]
    fn fresh_device_is_clean() {
        let device = dd(VolumeType::Ffs);
        let report = device.check(true);
        assert_eq!(report.bitmap_errors(), 0);
        assert_eq!(report.corrupted_blocks(), 0);
    }

    #[test]
    fn import_rejects_wrong_sizes_without_changes() {
        let mut device = dd(VolumeType::Ofs);
        device.make_dir("keep").unwrap();

        assert!(matches!(
            device.import_volume(&[0; 1000]),
            Err(FileSystemError::WrongBlockSize(1000))
        ));
        assert!(matches!(
            device.import_volume(&[0; 1024]),
            Err(FileSystemError::WrongCapacity { .. })
        ));
        assert_ne!(device.seek_dir(&FsName::new("keep")), 0);
    }

    #[test]
    fn export_checks_buffer_size() {
        let mut device = dd(VolumeType::Ofs);
        let mut small = vec![0; 512];
        assert!(device.export_volume(&mut small).is_err());
        assert!(device.export_block(880, &mut small).is_ok());
        assert_eq!(&small[..4], &[0, 0, 0, 2]);
    }
}
