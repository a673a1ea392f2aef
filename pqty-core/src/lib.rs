pub mod geometry {
    use glam::DVec3;
    use serde::{Deserialize, Serialize};

    /// 三维点，内部以 `glam::DVec3` 表示，配管模型的端点、分支点等都使用它。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        /// 两点连线的中点。
        #[inline]
        pub fn midpoint(self, other: Point3) -> Point3 {
            Self((self.0 + other.0) * 0.5)
        }

        #[inline]
        pub fn distance(self, other: Point3) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point3) -> Vector3 {
            Vector3(other.0 - self.0)
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 三维向量，目前用于计算分支角度。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn normalize(self) -> Option<Self> {
            let len = self.0.length();
            if len <= f64::EPSILON {
                None
            } else {
                Some(Self(self.0 / len))
            }
        }

        /// 两向量夹角（度），任一向量退化时返回 `None`。
        pub fn angle_degrees(self, other: Vector3) -> Option<f64> {
            let a = self.normalize()?;
            let b = other.normalize()?;
            let cos = a.0.dot(b.0).clamp(-1.0, 1.0);
            Some(cos.acos().to_degrees())
        }
    }

    impl From<DVec3> for Vector3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }
}

pub mod document {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use crate::geometry::Point3;

    /// 图纸内实体的标识。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 工厂数据库中的行标识，与图纸实体标识相互独立。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct RowId(i64);

    impl RowId {
        #[inline]
        pub fn new(raw: i64) -> Self {
            Self(raw)
        }

        #[inline]
        pub fn get(self) -> i64 {
            self.0
        }
    }

    /// 工厂属性值。数值与文本分开存放，由上层决定如何渲染成字符串。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum PropertyValue {
        Text(String),
        Integer(i64),
        Real(f64),
        Bool(bool),
    }

    impl From<&str> for PropertyValue {
        fn from(value: &str) -> Self {
            PropertyValue::Text(value.to_string())
        }
    }

    impl From<String> for PropertyValue {
        fn from(value: String) -> Self {
            PropertyValue::Text(value)
        }
    }

    impl From<i64> for PropertyValue {
        fn from(value: i64) -> Self {
            PropertyValue::Integer(value)
        }
    }

    impl From<f64> for PropertyValue {
        fn from(value: f64) -> Self {
            PropertyValue::Real(value)
        }
    }

    /// 扩展记录中的带类型值，对应图纸字典里的 Xrecord 数据项。
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub enum TypedValue {
        Text(String),
        Int(i64),
    }

    pub type Record = Vec<TypedValue>;

    /// 连接口。名称一般形如 `S1`、`S2`，公称直径可能缺失。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Port {
        pub name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub position: Option<Point3>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub nominal_diameter: Option<f64>,
    }

    impl Port {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                position: None,
                nominal_diameter: None,
            }
        }

        pub fn at(mut self, position: Point3) -> Self {
            self.position = Some(position);
            self
        }

        pub fn with_diameter(mut self, diameter: f64) -> Self {
            self.nominal_diameter = Some(diameter);
            self
        }
    }

    /// 实体暴露的几何属性，全部可选：不同实体类只提供其中一部分。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct EntityGeometry {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub start: Option<Point3>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub end: Option<Point3>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub position: Option<Point3>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub center_of_gravity: Option<Point3>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub center: Option<Point3>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub branch_point: Option<Point3>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PlantEntity {
        pub class_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub row_id: Option<RowId>,
        #[serde(default)]
        pub properties: BTreeMap<String, PropertyValue>,
        /// 本地化后的显示值（例如枚举的显示名），与原始值并存。
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        pub display_properties: BTreeMap<String, String>,
        #[serde(default)]
        pub geometry: EntityGeometry,
        #[serde(default)]
        pub ports: Vec<Port>,
        /// 实体级扩展字典。
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        pub extension: BTreeMap<String, Record>,
        #[serde(default)]
        pub erased: bool,
    }

    impl PlantEntity {
        pub fn new(class_name: impl Into<String>) -> Self {
            Self {
                class_name: class_name.into(),
                row_id: None,
                properties: BTreeMap::new(),
                display_properties: BTreeMap::new(),
                geometry: EntityGeometry::default(),
                ports: Vec::new(),
                extension: BTreeMap::new(),
                erased: false,
            }
        }

        pub fn with_row(mut self, row_id: RowId) -> Self {
            self.row_id = Some(row_id);
            self
        }

        pub fn with_property(
            mut self,
            name: impl Into<String>,
            value: impl Into<PropertyValue>,
        ) -> Self {
            self.properties.insert(name.into(), value.into());
            self
        }

        pub fn with_display_property(
            mut self,
            name: impl Into<String>,
            value: impl Into<String>,
        ) -> Self {
            self.display_properties.insert(name.into(), value.into());
            self
        }

        pub fn with_geometry(mut self, geometry: EntityGeometry) -> Self {
            self.geometry = geometry;
            self
        }

        pub fn with_port(mut self, port: Port) -> Self {
            self.ports.push(port);
            self
        }
    }

    /// 只存在于工厂数据库中的行（如垫片、螺栓组），不对应图纸实体。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PlantRow {
        pub id: RowId,
        pub class_name: String,
        #[serde(default)]
        pub properties: BTreeMap<String, PropertyValue>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        pub display_properties: BTreeMap<String, String>,
    }

    impl PlantRow {
        pub fn new(id: RowId, class_name: impl Into<String>) -> Self {
            Self {
                id,
                class_name: class_name.into(),
                properties: BTreeMap::new(),
                display_properties: BTreeMap::new(),
            }
        }

        pub fn with_property(
            mut self,
            name: impl Into<String>,
            value: impl Into<PropertyValue>,
        ) -> Self {
            self.properties.insert(name.into(), value.into());
            self
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Relationship {
        pub name: String,
        pub source: RowId,
        pub target: RowId,
    }

    /// 图纸文档：实体、工厂数据行、关系以及全局命名对象字典。
    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    #[serde(default)]
    pub struct PlantDocument {
        name: String,
        entities: Vec<(EntityId, PlantEntity)>,
        next_entity_id: u64,
        rows: Vec<PlantRow>,
        relationships: Vec<Relationship>,
        /// 命名对象字典：容器名 -> 记录名 -> 记录。
        named_objects: BTreeMap<String, BTreeMap<String, Record>>,
    }

    impl PlantDocument {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                ..Self::default()
            }
        }

        #[inline]
        pub fn name(&self) -> &str {
            &self.name
        }

        fn next_id(&mut self) -> EntityId {
            let id = EntityId::new(self.next_entity_id);
            self.next_entity_id += 1;
            id
        }

        pub fn add_entity(&mut self, entity: PlantEntity) -> EntityId {
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, PlantEntity)> {
            self.entities.iter()
        }

        pub fn entity(&self, id: EntityId) -> Option<&PlantEntity> {
            self.entities
                .iter()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut PlantEntity> {
            self.entities
                .iter_mut()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        /// 将实体标记为已删除，返回实体此前是否存在且未删除。
        pub fn erase(&mut self, id: EntityId) -> bool {
            match self.entity_mut(id) {
                Some(entity) if !entity.erased => {
                    entity.erased = true;
                    true
                }
                _ => false,
            }
        }

        /// 添加或替换同一行标识的数据行。
        pub fn add_row(&mut self, row: PlantRow) {
            if let Some(existing) = self.rows.iter_mut().find(|r| r.id == row.id) {
                *existing = row;
            } else {
                self.rows.push(row);
            }
        }

        pub fn row(&self, id: RowId) -> Option<&PlantRow> {
            self.rows.iter().find(|row| row.id == id)
        }

        pub fn row_mut(&mut self, id: RowId) -> Option<&mut PlantRow> {
            self.rows.iter_mut().find(|row| row.id == id)
        }

        #[inline]
        pub fn rows(&self) -> impl Iterator<Item = &PlantRow> {
            self.rows.iter()
        }

        /// 按行标识查找对应的图纸实体（未删除）。
        pub fn entity_by_row(&self, row_id: RowId) -> Option<(EntityId, &PlantEntity)> {
            self.entities.iter().find_map(|(id, entity)| {
                (!entity.erased && entity.row_id == Some(row_id)).then_some((*id, entity))
            })
        }

        pub fn relate(&mut self, name: impl Into<String>, source: RowId, target: RowId) {
            let relationship = Relationship {
                name: name.into(),
                source,
                target,
            };
            if !self.relationships.contains(&relationship) {
                self.relationships.push(relationship);
            }
        }

        /// 返回以 `source` 为起点、名称为 `name` 的关系目标，保持插入顺序。
        pub fn related(&self, source: RowId, name: &str) -> Vec<RowId> {
            self.relationships
                .iter()
                .filter(|rel| rel.source == source && rel.name == name)
                .map(|rel| rel.target)
                .collect()
        }

        pub fn named_record(&self, container: &str, name: &str) -> Option<&Record> {
            self.named_objects.get(container)?.get(name)
        }

        pub fn set_named_record(
            &mut self,
            container: impl Into<String>,
            name: impl Into<String>,
            record: Record,
        ) {
            self.named_objects
                .entry(container.into())
                .or_default()
                .insert(name.into(), record);
        }

        pub fn remove_named_record(&mut self, container: &str, name: &str) -> Option<Record> {
            let records = self.named_objects.get_mut(container)?;
            let removed = records.remove(name);
            if records.is_empty() {
                self.named_objects.remove(container);
            }
            removed
        }

        pub fn named_containers(&self) -> impl Iterator<Item = &str> {
            self.named_objects.keys().map(String::as_str)
        }
    }

}
