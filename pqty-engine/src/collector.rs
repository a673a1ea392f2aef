//! 聚合对象的收集：图纸中的主实体，以及经连接件关系找到的紧固件行。

use std::collections::HashSet;
use std::fmt;

use pqty_config::CollectorConfig;
use pqty_core::document::{EntityId, RowId};
use tracing::{debug, trace};

use crate::class::EntityClass;
use crate::host::{EntityStore, PlantPropertyService, RelationshipService};

/// 一个计数对象。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationTarget {
    Entity(EntityId),
    /// 没有图纸实体的紧固件行，`via` 为发现它的连接件。
    Fastener { row: RowId, via: EntityId },
}

impl AggregationTarget {
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            AggregationTarget::Entity(id) => Some(*id),
            AggregationTarget::Fastener { .. } => None,
        }
    }
}

impl fmt::Display for AggregationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationTarget::Entity(id) => write!(f, "E{}", id.get()),
            AggregationTarget::Fastener { row, .. } => write!(f, "R{}", row.get()),
        }
    }
}

pub struct Collector<'a> {
    config: &'a CollectorConfig,
}

impl<'a> Collector<'a> {
    pub fn new(config: &'a CollectorConfig) -> Self {
        Self { config }
    }

    fn matches_any(class_name: &str, patterns: &[String]) -> bool {
        let lowered = class_name.to_lowercase();
        patterns
            .iter()
            .filter(|pattern| !pattern.is_empty())
            .any(|pattern| lowered.contains(&pattern.to_lowercase()))
    }

    fn is_connector(&self, class_name: &str) -> bool {
        Self::matches_any(class_name, &self.config.connector_classes)
            || EntityClass::classify(class_name, None) == EntityClass::Connector
    }

    /// 先收集主实体并登记其数据行，再从连接件出发补充紧固件行，按标识去重。
    pub fn collect<H>(&self, host: &H) -> Vec<AggregationTarget>
    where
        H: EntityStore + PlantPropertyService + RelationshipService + ?Sized,
    {
        let mut targets = Vec::new();
        let mut seen_entities: HashSet<EntityId> = HashSet::new();
        let mut seen_rows: HashSet<RowId> = HashSet::new();
        let mut connectors = Vec::new();

        for id in host.entity_ids() {
            if !host.is_valid(id) {
                trace!(entity = id.get(), "跳过已删除或无效实体");
                continue;
            }
            let Some(entity) = host.entity(id) else {
                continue;
            };
            if Self::matches_any(&entity.class_name, &self.config.excluded_classes) {
                trace!(entity = id.get(), class = %entity.class_name, "类名被排除");
                continue;
            }
            if self.is_connector(&entity.class_name) {
                connectors.push(id);
                continue;
            }
            if seen_entities.insert(id) {
                if let Some(row) = host.row_of(id) {
                    seen_rows.insert(row);
                }
                targets.push(AggregationTarget::Entity(id));
            }
        }

        let primary_count = targets.len();
        for connector in connectors {
            let Some(base) = host.row_of(connector) else {
                trace!(entity = connector.get(), "连接件没有工厂数据行");
                continue;
            };
            for relationship in &self.config.fastener_relationships {
                for row in host.related(base, relationship) {
                    if seen_rows.insert(row) {
                        targets.push(AggregationTarget::Fastener {
                            row,
                            via: connector,
                        });
                    }
                }
            }
        }

        debug!(
            primary = primary_count,
            fasteners = targets.len() - primary_count,
            "已收集聚合对象"
        );
        targets
    }
}
