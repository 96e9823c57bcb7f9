use thiserror::Error;

use crate::{disk::BlockNr, fs::types::BlockType};

/// 文件系统错误类型
#[derive(Debug, Error)]
pub enum FileSystemError {
    #[error("Disk I/O error: {0}")]
    Io(#[from] std::io::Error), // 宿主机 I/O 错误

    #[error("Disk space is full")]
    DiskFull,

    #[error("File or directory not found: {0}")]
    NotFound(String),

    #[error("File or directory already exists: {0}")]
    AlreadyExists(String),

    #[error("Expected a directory: {0}")]
    NotADirectory(String),

    #[error("Expected a file: {0}")]
    NotAFile(String),

    #[error("Directory is not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Block {0} is out of range")]
    OutOfRange(BlockNr),

    #[error("File system has cycles")]
    HasCycles,

    #[error("Buffer size {0} is not a multiple of the block size")]
    WrongBlockSize(usize),

    #[error("Wrong capacity: expected {expected} bytes, got {actual}")]
    WrongCapacity { expected: usize, actual: usize },

    #[error("Unsupported file system: {0}")]
    Unsupported(String),

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("File system corrupted: {0}")]
    Corrupted(String),

    #[error("Layout serialization failed: {0}")]
    Serialization(#[from] bincode::Error),
}

/// 单个字节的完整性检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("expected value {0:#04x}")]
    ExpectedValue(u8),

    #[error("expected a value not larger than {0}")]
    ExpectedSmallerValue(u32),

    #[error("expected a DOS revision")]
    ExpectedDosRevision,

    #[error("expected a self reference")]
    ExpectedSelfRef,

    #[error("expected a block reference")]
    ExpectedRef,

    #[error("expected no block reference")]
    ExpectedNoRef,

    #[error("expected a data block number")]
    ExpectedDataBlockNr,

    #[error("invalid hash table size")]
    InvalidHashTableSize,

    #[error("invalid checksum")]
    InvalidChecksum,

    #[error("reference points outside the device")]
    PtrOutOfRange,

    #[error("reference points to {0}")]
    PtrToWrongType(BlockType),
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
