use std::fmt;

use crate::fs::config::{HASH_TABLE_SIZE, MAX_COMMENT_LEN, MAX_NAME_LEN};

/// 定长 BCPL 字符串：第一个字节是长度，后面跟字符（Latin-1）
#[derive(Debug, Clone)]
pub struct FsString {
    bytes: Vec<u8>,
    limit: usize,
}

impl FsString {
    pub fn new(s: &str, limit: usize) -> Self {
        let bytes = s
            .chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
            .take(limit)
            .collect();
        Self { bytes, limit }
    }

    /// 从块数据中 offset 处读取 BCPL 字符串，长度超出上限时截断
    pub fn from_bcpl(data: &[u8], offset: usize, limit: usize) -> Self {
        let len = data.get(offset).copied().unwrap_or(0) as usize;
        let len = len.min(limit);
        let start = (offset + 1).min(data.len());
        let end = (start + len).min(data.len());
        Self {
            bytes: data[start..end].to_vec(),
            limit,
        }
    }

    /// 写到块数据的 offset 处（长度字节 + 字符）
    pub fn write_bcpl(&self, data: &mut [u8], offset: usize) {
        data[offset] = self.bytes.len() as u8;
        data[offset + 1..offset + 1 + self.bytes.len()].copy_from_slice(&self.bytes);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// AmigaDOS 的名字哈希（未取模）
    pub fn hash_value(&self) -> u32 {
        let mut hash = self.bytes.len() as u32;
        for &c in &self.bytes {
            hash = (hash.wrapping_mul(13) + u32::from(c.to_ascii_uppercase())) & 0x7FF;
        }
        hash
    }

    pub fn eq_ignore_case(&self, other: &Self) -> bool {
        self.bytes.eq_ignore_ascii_case(&other.bytes)
    }
}

impl fmt::Display for FsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: String = self.bytes.iter().map(|&b| char::from(b)).collect();
        f.write_str(&s)
    }
}

/// 文件名 / 目录名 / 卷名（最多 30 个字符，大小写不敏感）
#[derive(Debug, Clone)]
pub struct FsName(FsString);

impl FsName {
    pub fn new(s: &str) -> Self {
        Self(FsString::new(s, MAX_NAME_LEN))
    }

    pub fn from_bcpl(data: &[u8], offset: usize) -> Self {
        Self(FsString::from_bcpl(data, offset, MAX_NAME_LEN))
    }

    pub fn write_bcpl(&self, data: &mut [u8], offset: usize) {
        self.0.write_bcpl(data, offset);
    }

    pub fn hash_value(&self) -> u32 {
        self.0.hash_value()
    }

    /// 在 72 槽哈希表中的位置
    pub fn hash_slot(&self) -> usize {
        self.hash_value() as usize % HASH_TABLE_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_fs_string(&self) -> &FsString {
        &self.0
    }
}

impl PartialEq for FsName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_case(&other.0)
    }
}

impl Eq for FsName {}

impl std::hash::Hash for FsName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash_value().hash(state);
    }
}

impl fmt::Display for FsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for FsName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// 注释（最多 91 个字符）
#[derive(Debug, Clone)]
pub struct FsComment(FsString);

impl FsComment {
    pub fn new(s: &str) -> Self {
        Self(FsString::new(s, MAX_COMMENT_LEN))
    }

    pub fn from_bcpl(data: &[u8], offset: usize) -> Self {
        Self(FsString::from_bcpl(data, offset, MAX_COMMENT_LEN))
    }

    pub fn write_bcpl(&self, data: &mut [u8], offset: usize) {
        self.0.write_bcpl(data, offset);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for FsComment {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_case(&other.0)
    }
}

impl fmt::Display for FsComment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
