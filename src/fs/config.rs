// 磁盘上的固定布局参数（均以 512 字节块为基准，可随块大小缩放的写成函数）

/// 目录哈希表的槽位数（512 字节块时为 72）
pub const HASH_TABLE_SIZE: usize = 72;

/// 哈希表在块内的起始字（word 6 起）
pub const HASH_TABLE_START: isize = 6;

/// OFS 数据块的头部大小：type / header / seq / size / next / checksum
pub const OFS_HEADER_SIZE: usize = 24;

/// 根块内直接存放的位图块引用个数
pub const ROOT_BITMAP_REFS: usize = 25;

/// 文件名最大长度（BCPL）
pub const MAX_NAME_LEN: usize = 30;

/// 注释最大长度（BCPL）
pub const MAX_COMMENT_LEN: usize = 91;

/// 引导块个数
pub const BOOT_BLOCKS: u32 = 2;

/// 位图有效标志（根块 word -50）
pub const BITMAP_VALID: u32 = 0xFFFF_FFFF;

// 主/次类型编号
pub const T_HEADER: u32 = 2;
pub const T_DATA: u32 = 8;
pub const T_LIST: u32 = 16;
pub const ST_ROOT: u32 = 1;
pub const ST_USERDIR: u32 = 2;
pub const ST_FILE: u32 = (-3i32) as u32;

/// 每块可容纳的哈希槽/数据块引用个数：bsize / 4 - 56
pub fn refs_per_block(bsize: usize) -> usize {
    bsize / 4 - 56
}

/// 位图块（去掉校验和字）能表示的块数
pub fn bits_per_bitmap_block(bsize: usize) -> usize {
    (bsize - 4) * 8
}

/// 位图扩展块可容纳的位图块引用个数（最后一个字是下一个扩展块）
pub fn refs_per_bitmap_ext_block(bsize: usize) -> usize {
    bsize / 4 - 1
}
