//! 一次完整的收集流程：收集 -> 构造键 -> 分配编号 -> 写回图纸。

use std::collections::BTreeMap;

use pqty_config::AppConfig;
use tracing::{debug, info, warn};

use crate::class::EntityClass;
use crate::collector::{AggregationTarget, Collector};
use crate::errors::EngineError;
use crate::host::PlantHost;
use crate::key::{AggregationKey, KeyCategory, KeyDeriver};
use crate::overrides::EntityOverrides;
use crate::store::QuantityIdStore;

/// 单个计数对象的结果。
#[derive(Debug, Clone)]
pub struct QuantityLine {
    pub target: AggregationTarget,
    pub class: EntityClass,
    pub key: AggregationKey,
    pub id: i64,
    pub formatted: String,
    pub length: Option<f64>,
}

/// 同一聚合键的汇总行。
#[derive(Debug, Clone, PartialEq)]
pub struct QuantitySummary {
    pub id: i64,
    pub formatted: String,
    pub key: AggregationKey,
    pub count: usize,
    /// 仅管道累计长度。
    pub total_length: f64,
}

#[derive(Debug, Clone, Default)]
pub struct QuantityReport {
    pub lines: Vec<QuantityLine>,
    /// 本次新分配的编号数量。
    pub new_keys: usize,
    pub next_id: i64,
}

impl QuantityReport {
    /// 按编号升序汇总。
    pub fn summaries(&self) -> Vec<QuantitySummary> {
        let mut grouped: BTreeMap<i64, QuantitySummary> = BTreeMap::new();
        for line in &self.lines {
            let entry = grouped.entry(line.id).or_insert_with(|| QuantitySummary {
                id: line.id,
                formatted: line.formatted.clone(),
                key: line.key.clone(),
                count: 0,
                total_length: 0.0,
            });
            entry.count += 1;
            if line.class == EntityClass::Pipe {
                entry.total_length += line.length.unwrap_or(0.0);
            }
        }
        grouped.into_values().collect()
    }

    pub fn line_for(&self, target: &AggregationTarget) -> Option<&QuantityLine> {
        self.lines.iter().find(|line| &line.target == target)
    }
}

pub struct QuantityPass<'a> {
    config: &'a AppConfig,
}

impl<'a> QuantityPass<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self { config }
    }

    /// 执行一次收集流程。
    ///
    /// 编号容量不足时立即中止，图纸不做任何修改。编号表写回失败时返回
    /// [`EngineError::Persistence`]，其中携带已算出的报表。
    pub fn run<H>(&self, host: &mut H) -> Result<QuantityReport, EngineError>
    where
        H: PlantHost + ?Sized,
    {
        let allocator = self.config.allocator;
        let store = QuantityIdStore::new(&self.config.storage);
        let overrides = EntityOverrides::new(&self.config.storage);
        let mut state = store.load(&*host, allocator.max_id, allocator.start_id);

        let targets = Collector::new(&self.config.collector).collect(&*host);
        let mut lines = Vec::with_capacity(targets.len());
        {
            let deriver = KeyDeriver::new(&*host, &self.config.keys);
            for target in targets {
                let derived = deriver.derive(target)?;
                let mut key = derived.key;
                if key.category() == Some(KeyCategory::Unknown) {
                    let cached = target
                        .entity()
                        .and_then(|entity| overrides.cached(&*host, entity))
                        .and_then(|cached| cached.key)
                        .map(AggregationKey::from_raw)
                        .filter(|cached| cached.category() != Some(KeyCategory::Unknown));
                    if let Some(cached) = cached {
                        debug!(%target, key = %cached, "属性缺失，沿用实体缓存的聚合键");
                        key = cached;
                    }
                }

                let id = state.get_or_create_id(key.as_str())?;
                lines.push(QuantityLine {
                    target,
                    class: derived.class,
                    formatted: state.format(id),
                    key,
                    id,
                    length: derived.extraction.length,
                });
            }
        }

        let report = QuantityReport {
            lines,
            new_keys: state.allocated(),
            next_id: state.next(),
        };

        if let Err(source) = store.save(&mut *host, &state) {
            return Err(EngineError::Persistence {
                source,
                report: Box::new(report),
            });
        }

        let mut refreshed = 0usize;
        for line in &report.lines {
            if let Some(entity) = line.target.entity() {
                match overrides.store(&mut *host, entity, line.key.as_str(), &line.formatted) {
                    Ok(true) => refreshed += 1,
                    Ok(false) => {}
                    Err(err) => {
                        warn!(entity = entity.get(), error = %err, "写入实体缓存失败");
                    }
                }
            }
            if let Err(err) = overrides.publish(&mut *host, &line.target, &line.formatted) {
                debug!(target = %line.target, error = %err, "数量编号属性不可写，仅保留扩展字典缓存");
            }
        }

        info!(
            targets = report.lines.len(),
            keys = state.len(),
            new_keys = report.new_keys,
            refreshed,
            next_id = report.next_id,
            "数量编号分配完成"
        );
        Ok(report)
    }
}
