use chrono::{Local, NaiveDateTime};
use std::path::Path;

/// 当前本地时间（AmigaDOS 时间戳不带时区）
pub fn current_datetime() -> NaiveDateTime {
    Local::now().naive_local()
}

/// 隐藏文件（包括 "." 和 ".."）在导入宿主目录时跳过
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// 路径的最后一段，用作卷名
pub fn last_component(path: &Path) -> Option<String> {
    path.file_name().map(|s| s.to_string_lossy().into_owned())
}
