//! 通用工具函数

use std::collections::HashSet;
use uuid::Uuid;

/// 用于唯一性比较的键：去除首尾空白并转为小写
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// 去除重复ID，保留首次出现的顺序
pub fn dedup_preserving_order(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
