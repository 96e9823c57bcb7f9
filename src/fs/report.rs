use crate::disk::types::BlockNr;

/// 文件系统检查结果
///
/// 损坏的块按块号升序保存，便于在块查看器中前后跳转。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorReport {
    bitmap_errors: usize,
    corrupted: Vec<BlockNr>,
}

impl ErrorReport {
    pub fn new(bitmap_errors: usize, mut corrupted: Vec<BlockNr>) -> Self {
        corrupted.sort_unstable();
        corrupted.dedup();
        Self {
            bitmap_errors,
            corrupted,
        }
    }

    pub fn bitmap_errors(&self) -> usize {
        self.bitmap_errors
    }

    pub fn corrupted_blocks(&self) -> usize {
        self.corrupted.len()
    }

    pub fn first_error_block(&self) -> Option<BlockNr> {
        self.corrupted.first().copied()
    }

    pub fn last_error_block(&self) -> Option<BlockNr> {
        self.corrupted.last().copied()
    }

    pub fn is_clean(&self) -> bool {
        self.bitmap_errors == 0 && self.corrupted.is_empty()
    }

    pub fn is_corrupted(&self, nr: BlockNr) -> bool {
        self.corrupted.binary_search(&nr).is_ok()
    }

    /// `nr` 是第几个损坏的块（从 0 开始）
    pub fn corrupted_index(&self, nr: BlockNr) -> Option<usize> {
        self.corrupted.binary_search(&nr).ok()
    }

    /// `nr` 之后的下一个损坏块
    pub fn next_corrupted(&self, nr: BlockNr) -> Option<BlockNr> {
        let i = self.corrupted.partition_point(|&b| b <= nr);
        self.corrupted.get(i).copied()
    }

    /// `nr` 之前的上一个损坏块
    pub fn prev_corrupted(&self, nr: BlockNr) -> Option<BlockNr> {
        let i = self.corrupted.partition_point(|&b| b < nr);
        i.checked_sub(1).and_then(|i| self.corrupted.get(i).copied())
    }

    /// 第 `n` 个损坏的块
    pub fn seek_corrupted_block(&self, n: usize) -> Option<BlockNr> {
        self.corrupted.get(n).copied()
    }

    pub fn corrupted(&self) -> &[BlockNr] {
        &self.corrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation() {
        let report = ErrorReport::new(1, vec![900, 12, 400]);
        assert!(!report.is_clean());
        assert_eq!(report.corrupted_blocks(), 3);
        assert_eq!(report.first_error_block(), Some(12));
        assert_eq!(report.last_error_block(), Some(900));

        assert!(report.is_corrupted(400));
        assert!(!report.is_corrupted(401));
        assert_eq!(report.corrupted_index(400), Some(1));
        assert_eq!(report.corrupted_index(13), None);

        assert_eq!(report.next_corrupted(12), Some(400));
        assert_eq!(report.next_corrupted(0), Some(12));
        assert_eq!(report.next_corrupted(900), None);
        assert_eq!(report.prev_corrupted(400), Some(12));
        assert_eq!(report.prev_corrupted(12), None);
        assert_eq!(report.prev_corrupted(5000), Some(900));

        assert_eq!(report.seek_corrupted_block(2), Some(900));
        assert_eq!(report.seek_corrupted_block(3), None);
    }

    #[test]
    fn empty_report() {
        let report = ErrorReport::default();
        assert!(report.is_clean());
        assert_eq!(report.first_error_block(), None);
        assert_eq!(report.next_corrupted(0), None);
    }
}
