use crate::{
    disk::{types::BlockNr, BlockStore},
    fs::{
        block::{CheckResult, Expect, Layout, RawBlock},
        error::BlockError,
        types::{ItemType, VolumeType},
    },
};

/// 标准 AmigaDOS 引导代码（从第 8 个字节开始，含根块号 880）
const BOOT_CODE: [u8; 42] = [
    0x00, 0x00, 0x03, 0x70, 0x43, 0xFA, 0x00, 0x18, 0x4E, 0xAE, 0xFF, 0xA0, 0x4A, 0x80, 0x67,
    0x0A, 0x20, 0x40, 0x20, 0x68, 0x00, 0x16, 0x70, 0x00, 0x4E, 0x75, 0x70, 0xFF, 0x60, 0xFA,
    0x64, 0x6F, 0x73, 0x2E, 0x6C, 0x69, 0x62, 0x72, 0x61, 0x72, 0x79, 0x00,
];

const BOOT_CODE_START: usize = 8;

/// 引导块。每个分区开头有两个，`page` 为 0 或 1。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootBlock {
    raw: RawBlock,
    page: usize,
}

impl_layout!(BootBlock);

impl BootBlock {
    pub fn new(nr: BlockNr, bsize: usize, page: usize, dos: VolumeType) -> Self {
        let mut block = Self {
            raw: RawBlock::new(nr, bsize),
            page,
        };
        block.write_dos_header(dos);
        block
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// 只有第一个引导块带 "DOS" 头
    fn write_dos_header(&mut self, dos: VolumeType) {
        if self.page != 0 {
            return;
        }
        if let Some(byte) = dos.dos_byte() {
            let data = self.raw.data_mut();
            data[0..3].copy_from_slice(b"DOS");
            data[3] = byte;
        }
    }

    /// 由 DOS 头推断卷类型
    pub fn dos(&self) -> VolumeType {
        let data = self.raw.data();
        if self.page == 0 && &data[0..3] == b"DOS" {
            VolumeType::from_dos_byte(data[3])
        } else {
            VolumeType::NoDos
        }
    }

    /// 引导代码区是否非空
    pub fn has_boot_code(&self) -> bool {
        let start = if self.page == 0 { BOOT_CODE_START } else { 0 };
        self.raw.data()[start..].iter().any(|&b| b != 0)
    }

    /// 写入标准引导代码（第二个块清零）
    pub fn write_boot_code(&mut self, dos: VolumeType) {
        self.clear();
        self.write_dos_header(dos);
        if self.page == 0 {
            let end = BOOT_CODE_START + BOOT_CODE.len();
            self.raw.data_mut()[BOOT_CODE_START..end].copy_from_slice(&BOOT_CODE);
        }
    }

    /// 清空除 DOS 头以外的所有字节
    pub fn clear(&mut self) {
        let start = if self.page == 0 { 4 } else { 0 };
        self.raw.data_mut()[start..].fill(0);
    }

    pub(crate) fn check(&self, byte: usize, store: &dyn BlockStore) -> CheckResult {
        if self.page != 0 {
            return Ok(());
        }
        let data = self.raw.data();
        match byte {
            0..=2 => {
                let want = b"DOS"[byte];
                if data[byte] == want {
                    Ok(())
                } else {
                    Err(BlockError::ExpectedValue(want))
                }
            }
            3 if data[3] > 7 => Err(BlockError::ExpectedDosRevision),
            4..=7 => {
                let Some(second) = store.block(self.nr() + 1).and_then(|b| b.as_boot()) else {
                    return Ok(());
                };
                if !self.has_boot_code() && !second.has_boot_code() {
                    return Ok(());
                }
                Expect::new(&self.raw, byte, store).long(boot_checksum(self, second))
            }
            _ => Ok(()),
        }
    }

    pub fn item_type(&self, byte: usize) -> ItemType {
        if self.page != 0 {
            return ItemType::Bootcode;
        }
        match byte {
            0..=2 => ItemType::DosHeader,
            3 => ItemType::DosVersion,
            4..=7 => ItemType::Checksum,
            _ => ItemType::Bootcode,
        }
    }
}

/// 跨两个引导块的校验和：带进位回卷的累加，最后取反（跳过第一个块的字 1）
pub fn boot_checksum(first: &BootBlock, second: &BootBlock) -> u32 {
    let add = |sum: u32, w: &[u8]| {
        let (s, carry) = sum.overflowing_add(u32::from_be_bytes([w[0], w[1], w[2], w[3]]));
        s.wrapping_add(u32::from(carry))
    };
    let sum = first
        .raw
        .data()
        .chunks_exact(4)
        .enumerate()
        .filter(|(i, _)| *i != 1)
        .fold(0u32, |acc, (_, w)| add(acc, w));
    let sum = second.raw.data().chunks_exact(4).fold(sum, add);
    !sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::types::BLOCK_SIZE;

    fn boot_pair(dos: VolumeType) -> (BootBlock, BootBlock) {
        (
            BootBlock::new(0, BLOCK_SIZE, 0, dos),
            BootBlock::new(1, BLOCK_SIZE, 1, dos),
        )
    }

    #[test]
    fn dos_header() {
        let (b0, b1) = boot_pair(VolumeType::Ffs);
        assert_eq!(&b0.raw().data()[0..4], b"DOS\x01");
        assert_eq!(b0.dos(), VolumeType::Ffs);
        assert_eq!(b1.dos(), VolumeType::NoDos);
        assert!(!b0.has_boot_code());
    }

    #[test]
    fn standard_boot_block_checksums() {
        let (mut b0, mut b1) = boot_pair(VolumeType::Ofs);
        b0.write_boot_code(VolumeType::Ofs);
        b1.write_boot_code(VolumeType::Ofs);
        assert!(b0.has_boot_code());
        assert_eq!(boot_checksum(&b0, &b1), 0xC020_0F19);

        let (mut b0, mut b1) = boot_pair(VolumeType::Ffs);
        b0.write_boot_code(VolumeType::Ffs);
        b1.write_boot_code(VolumeType::Ffs);
        assert_eq!(boot_checksum(&b0, &b1), 0xC020_0F18);
    }

    #[test]
    fn clear_keeps_dos_header() {
        let (mut b0, _) = boot_pair(VolumeType::Ofs);
        b0.write_boot_code(VolumeType::Ofs);
        b0.clear();
        assert!(!b0.has_boot_code());
        assert_eq!(b0.dos(), VolumeType::Ofs);
    }

    #[test]
    fn item_types() {
        let (b0, b1) = boot_pair(VolumeType::Ofs);
        assert_eq!(b0.item_type(0), ItemType::DosHeader);
        assert_eq!(b0.item_type(3), ItemType::DosVersion);
        assert_eq!(b0.item_type(5), ItemType::Checksum);
        assert_eq!(b0.item_type(100), ItemType::Bootcode);
        assert_eq!(b1.item_type(0), ItemType::Bootcode);
    }
}
