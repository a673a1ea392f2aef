//! 外部 CAD / 工厂数据平台的能力接口，以及基于 `PlantDocument` 的参考实现。

use pqty_core::document::{EntityId, PlantDocument, PlantEntity, PropertyValue, Record, RowId};

use crate::errors::StoreError;

/// 属性查询的寻址方式：图纸实体或工厂数据行。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyTarget {
    Entity(EntityId),
    Row(RowId),
}

/// 枚举与读取图纸实体。
pub trait EntityStore {
    fn entity_ids(&self) -> Vec<EntityId>;
    fn entity(&self, id: EntityId) -> Option<&PlantEntity>;

    /// 实体存在且未被删除。
    fn is_valid(&self, id: EntityId) -> bool {
        self.entity(id).is_some_and(|entity| !entity.erased)
    }
}

/// 工厂属性服务。查询失败一律表现为 `None`。
pub trait PlantPropertyService {
    fn property(&self, target: PropertyTarget, name: &str) -> Option<PropertyValue>;

    /// 本地化显示值，默认不提供。
    fn display_property(&self, _target: PropertyTarget, _name: &str) -> Option<String> {
        None
    }

    fn class_name(&self, target: PropertyTarget) -> Option<String>;

    fn row_of(&self, entity: EntityId) -> Option<RowId>;

    fn write_property(
        &mut self,
        target: PropertyTarget,
        name: &str,
        _value: &str,
    ) -> Result<(), StoreError> {
        Err(StoreError::PropertyNotWritable {
            target: format!("{target:?}"),
            property: name.to_string(),
        })
    }
}

/// 工厂数据行之间的关系遍历。
pub trait RelationshipService {
    fn related(&self, source: RowId, relationship: &str) -> Vec<RowId>;
}

/// 文档级命名对象字典。
pub trait NamedObjectStorage {
    fn read_record(&self, container: &str, name: &str) -> Option<Record>;

    /// 在同一次调用中写入多条记录；`None` 表示删除该记录。
    fn write_records(
        &mut self,
        container: &str,
        writes: Vec<(String, Option<Record>)>,
    ) -> Result<(), StoreError>;
}

/// 实体级扩展字典。
pub trait ExtensionStorage {
    fn read_extension(&self, entity: EntityId, name: &str) -> Option<Record>;
    fn write_extension(
        &mut self,
        entity: EntityId,
        name: &str,
        record: Record,
    ) -> Result<(), StoreError>;
}

/// 一次收集流程需要的全部能力。
pub trait PlantHost:
    EntityStore + PlantPropertyService + RelationshipService + NamedObjectStorage + ExtensionStorage
{
}

impl<T> PlantHost for T where
    T: EntityStore
        + PlantPropertyService
        + RelationshipService
        + NamedObjectStorage
        + ExtensionStorage
{
}

impl EntityStore for PlantDocument {
    fn entity_ids(&self) -> Vec<EntityId> {
        self.entities().map(|(id, _)| *id).collect()
    }

    fn entity(&self, id: EntityId) -> Option<&PlantEntity> {
        PlantDocument::entity(self, id)
    }
}

impl PlantPropertyService for PlantDocument {
    fn property(&self, target: PropertyTarget, name: &str) -> Option<PropertyValue> {
        match target {
            PropertyTarget::Entity(id) => PlantDocument::entity(self, id)
                .filter(|entity| !entity.erased)?
                .properties
                .get(name)
                .cloned(),
            PropertyTarget::Row(row_id) => match self.row(row_id) {
                Some(row) => row.properties.get(name).cloned(),
                None => self
                    .entity_by_row(row_id)
                    .and_then(|(_, entity)| entity.properties.get(name).cloned()),
            },
        }
    }

    fn display_property(&self, target: PropertyTarget, name: &str) -> Option<String> {
        match target {
            PropertyTarget::Entity(id) => PlantDocument::entity(self, id)
                .filter(|entity| !entity.erased)?
                .display_properties
                .get(name)
                .cloned(),
            PropertyTarget::Row(row_id) => match self.row(row_id) {
                Some(row) => row.display_properties.get(name).cloned(),
                None => self
                    .entity_by_row(row_id)
                    .and_then(|(_, entity)| entity.display_properties.get(name).cloned()),
            },
        }
    }

    fn class_name(&self, target: PropertyTarget) -> Option<String> {
        match target {
            PropertyTarget::Entity(id) => {
                PlantDocument::entity(self, id).map(|entity| entity.class_name.clone())
            }
            PropertyTarget::Row(row_id) => self
                .row(row_id)
                .map(|row| row.class_name.clone())
                .or_else(|| {
                    self.entity_by_row(row_id)
                        .map(|(_, entity)| entity.class_name.clone())
                }),
        }
    }

    fn row_of(&self, entity: EntityId) -> Option<RowId> {
        PlantDocument::entity(self, entity).and_then(|entity| entity.row_id)
    }

    fn write_property(
        &mut self,
        target: PropertyTarget,
        name: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let properties = match target {
            PropertyTarget::Entity(id) => match self.entity_mut(id) {
                Some(entity) if !entity.erased => &mut entity.properties,
                _ => return Err(StoreError::EntityUnavailable(id.get())),
            },
            PropertyTarget::Row(row_id) => match self.row_mut(row_id) {
                Some(row) => &mut row.properties,
                None => {
                    return Err(StoreError::PropertyNotWritable {
                        target: format!("row {}", row_id.get()),
                        property: name.to_string(),
                    });
                }
            },
        };
        properties.insert(name.to_string(), PropertyValue::Text(value.to_string()));
        Ok(())
    }
}

impl RelationshipService for PlantDocument {
    fn related(&self, source: RowId, relationship: &str) -> Vec<RowId> {
        PlantDocument::related(self, source, relationship)
    }
}

impl NamedObjectStorage for PlantDocument {
    fn read_record(&self, container: &str, name: &str) -> Option<Record> {
        self.named_record(container, name).cloned()
    }

    fn write_records(
        &mut self,
        container: &str,
        writes: Vec<(String, Option<Record>)>,
    ) -> Result<(), StoreError> {
        for (name, record) in writes {
            match record {
                Some(record) => self.set_named_record(container, name, record),
                None => {
                    self.remove_named_record(container, &name);
                }
            }
        }
        Ok(())
    }
}

impl ExtensionStorage for PlantDocument {
    fn read_extension(&self, entity: EntityId, name: &str) -> Option<Record> {
        PlantDocument::entity(self, entity)?
            .extension
            .get(name)
            .cloned()
    }

    fn write_extension(
        &mut self,
        entity: EntityId,
        name: &str,
        record: Record,
    ) -> Result<(), StoreError> {
        match self.entity_mut(entity) {
            Some(target) if !target.erased => {
                target.extension.insert(name.to_string(), record);
                Ok(())
            }
            _ => Err(StoreError::EntityUnavailable(entity.get())),
        }
    }
}

#[cfg(test)]
mod tests {
    use pqty_core::document::{PlantRow, TypedValue};

    use super::*;

    fn sample() -> (PlantDocument, EntityId) {
        let mut doc = PlantDocument::new("host");
        let pipe = doc.add_entity(
            PlantEntity::new("Pipe")
                .with_row(RowId::new(100))
                .with_property("Size", 100.0)
                .with_display_property("InstallMethod", "架設"),
        );
        doc.add_row(PlantRow::new(RowId::new(200), "Gasket").with_property("ItemCode", "GK-1"));
        (doc, pipe)
    }

    #[test]
    fn properties_resolve_by_entity_and_row() {
        let (doc, pipe) = sample();
        assert_eq!(
            doc.property(PropertyTarget::Entity(pipe), "Size"),
            Some(PropertyValue::Real(100.0))
        );
        // 行寻址可回落到拥有该行的实体
        assert_eq!(
            doc.property(PropertyTarget::Row(RowId::new(100)), "Size"),
            Some(PropertyValue::Real(100.0))
        );
        assert_eq!(
            doc.property(PropertyTarget::Row(RowId::new(200)), "ItemCode"),
            Some(PropertyValue::Text("GK-1".to_string()))
        );
        assert_eq!(
            doc.display_property(PropertyTarget::Entity(pipe), "InstallMethod")
                .as_deref(),
            Some("架設")
        );
        assert_eq!(
            doc.class_name(PropertyTarget::Row(RowId::new(200)))
                .as_deref(),
            Some("Gasket")
        );
        assert_eq!(doc.row_of(pipe), Some(RowId::new(100)));
    }

    #[test]
    fn erased_entities_are_invisible_to_lookups() {
        let (mut doc, pipe) = sample();
        assert!(doc.is_valid(pipe));
        doc.erase(pipe);
        assert!(!doc.is_valid(pipe));
        assert!(doc.property(PropertyTarget::Entity(pipe), "Size").is_none());
        let err = doc
            .write_extension(pipe, "QTY", vec![TypedValue::Int(1)])
            .unwrap_err();
        assert!(matches!(err, StoreError::EntityUnavailable(_)));
    }

    #[test]
    fn write_records_applies_puts_and_deletes() {
        let (mut doc, _) = sample();
        doc.write_records(
            "C",
            vec![
                ("A".to_string(), Some(vec![TypedValue::Int(1)])),
                ("B".to_string(), Some(vec![TypedValue::Int(2)])),
            ],
        )
        .unwrap();
        doc.write_records("C", vec![("A".to_string(), None)]).unwrap();
        assert!(doc.read_record("C", "A").is_none());
        assert_eq!(doc.read_record("C", "B"), Some(vec![TypedValue::Int(2)]));
    }

    #[test]
    fn write_property_targets_entities_and_rows() {
        let (mut doc, pipe) = sample();
        doc.write_property(PropertyTarget::Entity(pipe), "QuantityId", "0001")
            .unwrap();
        doc.write_property(PropertyTarget::Row(RowId::new(200)), "QuantityId", "0002")
            .unwrap();
        assert_eq!(
            doc.property(PropertyTarget::Entity(pipe), "QuantityId"),
            Some(PropertyValue::Text("0001".to_string()))
        );
        let missing = doc.write_property(PropertyTarget::Row(RowId::new(999)), "QuantityId", "1");
        assert!(matches!(
            missing,
            Err(StoreError::PropertyNotWritable { .. })
        ));
    }
}
