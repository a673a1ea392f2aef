//! 数量编号分配器：聚合键 -> 正整数编号，编号只增不减、一经分配永不改变。

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::errors::EngineError;

/// `max_id` 的十进制位数，即编号的补零宽度。
pub fn digits_for(max_id: i64) -> usize {
    let mut value = max_id.max(1);
    let mut digits = 0;
    while value > 0 {
        digits += 1;
        value /= 10;
    }
    digits
}

/// 按固定宽度补零；负数原样输出。
pub fn format_id(id: i64, digits: usize) -> String {
    if id < 0 {
        id.to_string()
    } else {
        format!("{id:0digits$}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuantityIdState {
    map: HashMap<String, i64>,
    next: i64,
    digits: usize,
    max_id: i64,
    start_id: i64,
    allocated: usize,
}

impl QuantityIdState {
    /// 空状态，`max_id` 与 `start_id` 至少为 1。
    pub fn new(max_id: i64, start_id: i64) -> Self {
        let max_id = max_id.max(1);
        let start_id = start_id.max(1);
        Self {
            map: HashMap::new(),
            next: start_id,
            digits: digits_for(max_id),
            max_id,
            start_id,
            allocated: 0,
        }
    }

    /// 由持久化记录重建状态。
    ///
    /// 非正编号、重复键、与已有键冲突的编号逐条跳过。计数器缺失时由已有编号推算；
    /// 计数器小于 `start_id` 或不大于已有最大编号时向上修正。
    pub fn from_entries<I>(entries: I, next: Option<i64>, max_id: i64, start_id: i64) -> Self
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        let mut state = Self::new(max_id, start_id);
        let mut used: HashSet<i64> = HashSet::new();
        for (key, id) in entries {
            let key = key.trim().to_string();
            if id < 1 {
                warn!(key = %key, id, "跳过非正数量编号");
                continue;
            }
            if id == i64::MAX {
                warn!(key = %key, id, "数量编号超出可表示范围，跳过");
                continue;
            }
            if state.map.contains_key(&key) {
                warn!(key = %key, id, "跳过重复的聚合键");
                continue;
            }
            if !used.insert(id) {
                warn!(key = %key, id, "数量编号已被其他键占用，跳过");
                continue;
            }
            state.map.insert(key, id);
        }

        let highest = state.map.values().copied().max();
        let derived = highest.map_or(state.start_id, |max| max + 1);
        let mut next = next.unwrap_or(derived);
        if next < state.start_id {
            next = state.start_id;
        }
        if let Some(max) = highest {
            if next <= max {
                warn!(next, highest = max, "计数器落后于已分配编号，已修正");
                next = max + 1;
            }
        }
        state.next = next;
        debug!(
            keys = state.map.len(),
            next = state.next,
            max_id = state.max_id,
            "已载入数量编号状态"
        );
        state
    }

    /// 已存在的键直接返回原编号且不修改状态；否则分配 `next` 并递增。
    /// 超过 `max_id` 时返回 [`EngineError::CapacityExceeded`]，已分配的编号不受影响。
    pub fn get_or_create_id(&mut self, key: &str) -> Result<i64, EngineError> {
        let key = key.trim();
        if let Some(id) = self.map.get(key) {
            return Ok(*id);
        }
        let following = match self.next.checked_add(1) {
            Some(following) if self.next <= self.max_id => following,
            _ => {
                return Err(EngineError::CapacityExceeded {
                    max_id: self.max_id,
                    next: self.next,
                });
            }
        };
        let id = self.next;
        self.map.insert(key.to_string(), id);
        self.next = following;
        self.allocated += 1;
        debug!(key, id, "分配新的数量编号");
        Ok(id)
    }

    #[inline]
    pub fn id_of(&self, key: &str) -> Option<i64> {
        self.map.get(key.trim()).copied()
    }

    #[inline]
    pub fn format(&self, id: i64) -> String {
        format_id(id, self.digits)
    }

    #[inline]
    pub fn next(&self) -> i64 {
        self.next
    }

    #[inline]
    pub fn digits(&self) -> usize {
        self.digits
    }

    #[inline]
    pub fn max_id(&self) -> i64 {
        self.max_id
    }

    #[inline]
    pub fn start_id(&self) -> i64 {
        self.start_id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// 本次会话新分配的编号数量。
    #[inline]
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// 按编号升序列出所有映射。
    pub fn entries_by_id(&self) -> Vec<(&str, i64)> {
        let mut entries: Vec<(&str, i64)> = self
            .map
            .iter()
            .map(|(key, id)| (key.as_str(), *id))
            .collect();
        entries.sort_by_key(|(_, id)| *id);
        entries
    }
}
