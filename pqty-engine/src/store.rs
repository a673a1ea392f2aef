//! 编号表与计数器在图纸命名对象字典中的持久化。
//!
//! 规范格式为交错的带类型记录：`Text(key), Int(id), Text(key), Int(id), ...`；
//! 计数器为单值记录 `Int(next)`。旧版的 `"<id>\t<key>"` 换行文本记录只在规范记录缺失时读取，
//! 下一次保存会写入规范记录并删除旧记录。

use pqty_config::StorageConfig;
use pqty_core::document::{Record, TypedValue};
use tracing::{debug, info, warn};

use crate::allocator::QuantityIdState;
use crate::errors::StoreError;
use crate::host::NamedObjectStorage;

pub struct QuantityIdStore<'a> {
    names: &'a StorageConfig,
}

impl<'a> QuantityIdStore<'a> {
    pub fn new(names: &'a StorageConfig) -> Self {
        Self { names }
    }

    /// 读取编号表与计数器；损坏的条目逐条跳过，不会使整体读取失败。
    pub fn load<S>(&self, storage: &S, max_id: i64, start_id: i64) -> QuantityIdState
    where
        S: NamedObjectStorage + ?Sized,
    {
        let container = self.names.container.as_str();
        let entries = match storage.read_record(container, &self.names.map_record) {
            Some(record) => decode_pairs(&record),
            None => match storage.read_record(container, &self.names.legacy_map_record) {
                Some(record) => {
                    info!(record = %self.names.legacy_map_record, "读取旧版文本格式编号表");
                    decode_text_lines(&record)
                }
                None => Vec::new(),
            },
        };
        let next = storage
            .read_record(container, &self.names.next_record)
            .and_then(|record| decode_counter(&record));
        QuantityIdState::from_entries(entries, next, max_id, start_id)
    }

    /// 在一次写入中提交编号表与计数器，并删除旧版文本记录。
    pub fn save<S>(&self, storage: &mut S, state: &QuantityIdState) -> Result<(), StoreError>
    where
        S: NamedObjectStorage + ?Sized,
    {
        let writes = vec![
            (self.names.map_record.clone(), Some(encode_pairs(state))),
            (
                self.names.next_record.clone(),
                Some(vec![TypedValue::Int(state.next())]),
            ),
            (self.names.legacy_map_record.clone(), None),
        ];
        storage.write_records(&self.names.container, writes)?;
        debug!(keys = state.len(), next = state.next(), "已写回数量编号状态");
        Ok(())
    }
}

/// 按编号升序编码，便于比较前后两次保存的差异。
pub fn encode_pairs(state: &QuantityIdState) -> Record {
    let mut record = Vec::with_capacity(state.len() * 2);
    for (key, id) in state.entries_by_id() {
        record.push(TypedValue::Text(key.to_string()));
        record.push(TypedValue::Int(id));
    }
    record
}

fn decode_id(value: &TypedValue) -> Option<i64> {
    match value {
        TypedValue::Int(id) => Some(*id),
        TypedValue::Text(text) => text.trim().parse().ok(),
    }
}

pub fn decode_pairs(record: &Record) -> Vec<(String, i64)> {
    let mut entries = Vec::with_capacity(record.len() / 2);
    let mut chunks = record.chunks_exact(2);
    for (index, pair) in chunks.by_ref().enumerate() {
        match (&pair[0], decode_id(&pair[1])) {
            (TypedValue::Text(key), Some(id)) => entries.push((key.clone(), id)),
            _ => warn!(pair = index, "跳过无法解析的编号表条目"),
        }
    }
    if !chunks.remainder().is_empty() {
        warn!("编号表记录长度为奇数，忽略末尾条目");
    }
    entries
}

/// 旧版格式：所有文本段拼接后按行解析 `"<id>\t<key>"`。
pub fn decode_text_lines(record: &Record) -> Vec<(String, i64)> {
    let text: String = record
        .iter()
        .filter_map(|value| match value {
            TypedValue::Text(text) => Some(text.as_str()),
            TypedValue::Int(_) => None,
        })
        .collect();
    let mut entries = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed = line
            .split_once('\t')
            .and_then(|(id, key)| Some((key.to_string(), id.trim().parse::<i64>().ok()?)));
        match parsed {
            Some(entry) => entries.push(entry),
            None => warn!(line = line_no + 1, "跳过无法解析的旧版编号行"),
        }
    }
    entries
}

pub fn encode_text_lines(entries: &[(&str, i64)]) -> Record {
    let text: String = entries
        .iter()
        .map(|(key, id)| format!("{id}\t{key}\n"))
        .collect();
    vec![TypedValue::Text(text)]
}

fn decode_counter(record: &Record) -> Option<i64> {
    let next = record.first().and_then(decode_id);
    if next.is_none() {
        warn!("计数器记录无法解析，将由编号表推算");
    }
    next
}
