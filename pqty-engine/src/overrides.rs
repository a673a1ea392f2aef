//! 实体级缓存：把解析出的聚合键与数量编号写入实体扩展字典，
//! 也可回写到工厂属性槽位。工厂属性不可用时扩展字典是后备来源。

use pqty_config::StorageConfig;
use pqty_core::document::{EntityId, Record, TypedValue};
use tracing::trace;

use crate::collector::AggregationTarget;
use crate::errors::StoreError;
use crate::host::{ExtensionStorage, PlantPropertyService, PropertyTarget};
use crate::property::PropertyResolver;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedAssignment {
    pub key: Option<String>,
    pub quantity_id: Option<String>,
}

impl CachedAssignment {
    fn encode(key: &str, quantity_id: &str) -> Record {
        vec![
            TypedValue::Text(key.to_string()),
            TypedValue::Text(quantity_id.to_string()),
        ]
    }

    fn decode(record: &Record) -> Self {
        let text = |index: usize| match record.get(index) {
            Some(TypedValue::Text(text)) if !text.is_empty() => Some(text.clone()),
            Some(TypedValue::Int(value)) => Some(value.to_string()),
            _ => None,
        };
        Self {
            key: text(0),
            quantity_id: text(1),
        }
    }
}

pub struct EntityOverrides<'a> {
    names: &'a StorageConfig,
}

impl<'a> EntityOverrides<'a> {
    pub fn new(names: &'a StorageConfig) -> Self {
        Self { names }
    }

    pub fn cached<H>(&self, host: &H, entity: EntityId) -> Option<CachedAssignment>
    where
        H: ExtensionStorage + ?Sized,
    {
        host.read_extension(entity, &self.names.entity_record)
            .map(|record| CachedAssignment::decode(&record))
    }

    /// 仅在内容变化时写入扩展记录，返回是否发生了写入。
    pub fn store<H>(
        &self,
        host: &mut H,
        entity: EntityId,
        key: &str,
        quantity_id: &str,
    ) -> Result<bool, StoreError>
    where
        H: ExtensionStorage + ?Sized,
    {
        let current = self.cached(&*host, entity);
        let wanted = CachedAssignment {
            key: Some(key.to_string()).filter(|k| !k.is_empty()),
            quantity_id: Some(quantity_id.to_string()),
        };
        if current.as_ref() == Some(&wanted) {
            return Ok(false);
        }
        host.write_extension(
            entity,
            &self.names.entity_record,
            CachedAssignment::encode(key, quantity_id),
        )?;
        Ok(true)
    }

    /// 若配置了属性名，把编号写入工厂属性槽位。未配置时什么也不做。
    pub fn publish<H>(
        &self,
        host: &mut H,
        target: &AggregationTarget,
        quantity_id: &str,
    ) -> Result<(), StoreError>
    where
        H: PlantPropertyService + ?Sized,
    {
        let Some(property) = self.names.id_property.as_deref() else {
            return Ok(());
        };
        let lookup = match target {
            AggregationTarget::Entity(id) => PropertyTarget::Entity(*id),
            AggregationTarget::Fastener { row, .. } => PropertyTarget::Row(*row),
        };
        host.write_property(lookup, property, quantity_id)
    }

    /// 快速读取对象的数量编号：先读工厂属性，再读扩展字典缓存。
    pub fn quantity_id_of<H>(&self, host: &H, target: &AggregationTarget) -> Option<String>
    where
        H: PlantPropertyService + ExtensionStorage + ?Sized,
    {
        if let Some(property) = self.names.id_property.as_ref() {
            let resolver = PropertyResolver::new(host);
            if let Some(value) = resolver.resolve(target, std::slice::from_ref(property)) {
                return Some(value);
            }
        }
        let entity = target.entity()?;
        let cached = self.cached(host, entity)?.quantity_id;
        if cached.is_some() {
            trace!(entity = entity.get(), "使用扩展字典中的数量编号");
        }
        cached
    }
}
