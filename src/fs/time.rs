use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::fmt;

use crate::utils::current_datetime;

/// 每秒的 tick 数（PAL 50Hz）
pub const TICKS_PER_SECOND: u32 = 50;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// AmigaDOS 时间戳：自 1978-01-01 起的天数、当天分钟数、当分钟内的 tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FsTime {
    pub days: u32,
    pub mins: u32,
    pub ticks: u32,
}

fn amiga_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1978, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

impl FsTime {
    pub fn new(days: u32, mins: u32, ticks: u32) -> Self {
        Self { days, mins, ticks }
    }

    pub fn now() -> Self {
        Self::from_datetime(current_datetime())
    }

    /// 早于 Amiga 纪元的时间按纪元处理
    pub fn from_datetime(t: NaiveDateTime) -> Self {
        let secs = (t - amiga_epoch()).num_seconds().max(0);
        let days = secs / SECONDS_PER_DAY;
        let rest = secs % SECONDS_PER_DAY;
        Self {
            days: days as u32,
            mins: (rest / 60) as u32,
            ticks: (rest % 60) as u32 * TICKS_PER_SECOND,
        }
    }

    pub fn to_datetime(self) -> NaiveDateTime {
        amiga_epoch()
            + Duration::days(i64::from(self.days))
            + Duration::minutes(i64::from(self.mins))
            + Duration::seconds(i64::from(self.ticks / TICKS_PER_SECOND))
    }

    /// 从块数据 offset 处读取三个大端字
    pub fn read(data: &[u8], offset: usize) -> Self {
        let word = |i: usize| {
            let p = offset + 4 * i;
            u32::from_be_bytes([data[p], data[p + 1], data[p + 2], data[p + 3]])
        };
        Self::new(word(0), word(1), word(2))
    }

    pub fn write(&self, data: &mut [u8], offset: usize) {
        data[offset..offset + 4].copy_from_slice(&self.days.to_be_bytes());
        data[offset + 4..offset + 8].copy_from_slice(&self.mins.to_be_bytes());
        data[offset + 8..offset + 12].copy_from_slice(&self.ticks.to_be_bytes());
    }
}

impl fmt::Display for FsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().format("%Y-%m-%d %H:%M:%S"))
    }
}
