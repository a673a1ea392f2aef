use pqty_config::AppConfig;
use pqty_core::document::{
    EntityGeometry, EntityId, PlantDocument, PlantEntity, PlantRow, Port, PropertyValue, Record,
    RowId, TypedValue,
};
use pqty_core::geometry::Point3;
use pqty_engine::collector::AggregationTarget;
use pqty_engine::errors::{EngineError, StoreError};
use pqty_engine::host::{
    EntityStore, ExtensionStorage, NamedObjectStorage, PlantPropertyService, PropertyTarget,
    RelationshipService,
};
use pqty_engine::overrides::EntityOverrides;
use pqty_engine::pass::QuantityPass;
use pqty_engine::store::QuantityIdStore;
use pqty_io::{DocumentLoader, DocumentSaver, JsonFacade};

struct Plant {
    doc: PlantDocument,
    pipe_a: EntityId,
    pipe_b: EntityId,
    elbow: EntityId,
    tee: EntityId,
    valve: EntityId,
}

fn straight(length: f64) -> EntityGeometry {
    EntityGeometry {
        start: Some(Point3::new(0.0, 0.0, 0.0)),
        end: Some(Point3::new(length, 0.0, 0.0)),
        ..EntityGeometry::default()
    }
}

fn sample_plant() -> Plant {
    let mut doc = PlantDocument::new("plant");
    let pipe = |length| {
        PlantEntity::new("Pipe")
            .with_property("MaterialCode", "STW")
            .with_property("InstallMethod", "架設")
            .with_property("Size", "100")
            .with_geometry(straight(length))
    };
    let pipe_a = doc.add_entity(pipe(2500.0));
    let pipe_b = doc.add_entity(pipe(1500.0));
    let elbow = doc.add_entity(
        PlantEntity::new("Elbow")
            .with_property("Description", "L90")
            .with_property("InstallMethod", "架設")
            .with_property("Size", "50")
            .with_property("Angle", 90.0),
    );
    let tee = doc.add_entity(
        PlantEntity::new("Tee")
            .with_property("ItemCode", "T-1")
            .with_property("InstallMethod", "架設")
            .with_port(Port::new("S1").with_diameter(100.0))
            .with_port(Port::new("S2").with_diameter(100.0))
            .with_port(Port::new("S3").with_diameter(50.0)),
    );
    let valve = doc.add_entity(
        PlantEntity::new("GateValve")
            .with_row(RowId::new(30))
            .with_property("Size", "80"),
    );
    doc.add_row(PlantRow::new(RowId::new(30), "GateValve").with_property("ItemCode", "GV-80"));

    doc.add_row(PlantRow::new(RowId::new(10), "Connector"));
    doc.add_row(
        PlantRow::new(RowId::new(20), "Gasket")
            .with_property("ItemCode", "GK-100")
            .with_property("Size", "100"),
    );
    doc.add_row(
        PlantRow::new(RowId::new(21), "BoltSet")
            .with_property("Description", "M16x4")
            .with_property("Size", "100"),
    );
    doc.add_entity(PlantEntity::new("Connector").with_row(RowId::new(10)));
    doc.relate("ConnectorFastener", RowId::new(10), RowId::new(20));
    doc.relate("BoltSetConnection", RowId::new(10), RowId::new(21));

    Plant {
        doc,
        pipe_a,
        pipe_b,
        elbow,
        tee,
        valve,
    }
}

fn map_record(doc: &PlantDocument, config: &AppConfig) -> Option<Record> {
    doc.named_record(&config.storage.container, &config.storage.map_record)
        .cloned()
}

#[test]
fn full_pass_assigns_shared_ids_and_totals() {
    let mut plant = sample_plant();
    let config = AppConfig::default();
    let report = QuantityPass::new(&config).run(&mut plant.doc).unwrap();

    // 两根管道 + 弯头 + 三通 + 阀门 + 两个紧固件行，连接件本身不计数
    assert_eq!(report.lines.len(), 7);
    let a = report.line_for(&AggregationTarget::Entity(plant.pipe_a)).unwrap();
    let b = report.line_for(&AggregationTarget::Entity(plant.pipe_b)).unwrap();
    assert_eq!(a.id, b.id);
    assert_eq!(a.formatted, "0001");
    assert_eq!(a.key.as_str(), "PIPE|STW|架設|100");

    let keys: Vec<&str> = report.lines.iter().map(|line| line.key.as_str()).collect();
    assert!(keys.contains(&"ELBOW|L90|架設|50|90"));
    assert!(keys.contains(&"TEE|T-1|架設|100x50"));
    assert!(keys.contains(&"ASSET|GV-80||80"));
    assert!(keys.contains(&"FASTENER|GK-100||100"));
    assert!(keys.contains(&"FASTENER|M16X4||100"));

    let summaries = report.summaries();
    assert_eq!(summaries.len(), 6);
    assert_eq!(summaries[0].count, 2);
    assert!((summaries[0].total_length - 4000.0).abs() < 1e-9);
    assert!(summaries.windows(2).all(|pair| pair[0].id < pair[1].id));
    assert_eq!(report.new_keys, 6);
    assert_eq!(report.next_id, 7);

    let stored = map_record(&plant.doc, &config).unwrap();
    assert_eq!(stored.len(), 12);
    assert_eq!(
        plant
            .doc
            .named_record(&config.storage.container, &config.storage.next_record),
        Some(&vec![TypedValue::Int(7)])
    );

    let overrides = EntityOverrides::new(&config.storage);
    let cached = overrides.cached(&plant.doc, plant.elbow).unwrap();
    assert_eq!(cached.key.as_deref(), Some("ELBOW|L90|架設|50|90"));
    assert!(overrides.cached(&plant.doc, plant.tee).is_some());
}

#[test]
fn rerun_is_stable_and_allocates_nothing() {
    let mut plant = sample_plant();
    let config = AppConfig::default();
    let first = QuantityPass::new(&config).run(&mut plant.doc).unwrap();
    let before = map_record(&plant.doc, &config);

    let second = QuantityPass::new(&config).run(&mut plant.doc).unwrap();
    assert_eq!(second.new_keys, 0);
    assert_eq!(second.next_id, first.next_id);
    for line in &first.lines {
        assert_eq!(second.line_for(&line.target).map(|l| l.id), Some(line.id));
    }
    assert_eq!(map_record(&plant.doc, &config), before);
}

#[test]
fn new_entities_extend_without_renumbering() {
    let mut plant = sample_plant();
    let config = AppConfig::default();
    let first = QuantityPass::new(&config).run(&mut plant.doc).unwrap();

    let added = plant.doc.add_entity(
        PlantEntity::new("Pipe")
            .with_property("MaterialCode", "SUS")
            .with_property("Size", "25"),
    );
    let second = QuantityPass::new(&config).run(&mut plant.doc).unwrap();
    assert_eq!(second.new_keys, 1);
    assert_eq!(
        second.line_for(&AggregationTarget::Entity(added)).map(|l| l.id),
        Some(first.next_id)
    );
    let valve = AggregationTarget::Entity(plant.valve);
    assert_eq!(
        second.line_for(&valve).map(|l| l.id),
        first.line_for(&valve).map(|l| l.id)
    );
}

#[test]
fn capacity_exceeded_persists_nothing() {
    let mut plant = sample_plant();
    let mut config = AppConfig::default();
    config.allocator.max_id = 3;

    let err = QuantityPass::new(&config).run(&mut plant.doc).unwrap_err();
    assert!(matches!(err, EngineError::CapacityExceeded { max_id: 3, next: 4 }));
    assert!(map_record(&plant.doc, &config).is_none());
    assert!(plant.doc.entities().all(|(_, entity)| entity.extension.is_empty()));
}

#[test]
fn missing_properties_fall_back_to_cached_key() {
    let mut doc = PlantDocument::new("cache");
    let id = doc.add_entity(PlantEntity::new("Pipe").with_property("Size", "100"));
    let config = AppConfig::default();
    let first = QuantityPass::new(&config).run(&mut doc).unwrap();
    assert_eq!(first.lines[0].key.as_str(), "PIPE|||100");

    // 类名与属性都丢失后退化为 UNKNOWN，此时沿用缓存中的键
    let entity = doc.entity_mut(id).unwrap();
    entity.class_name.clear();
    entity.properties.clear();
    let second = QuantityPass::new(&config).run(&mut doc).unwrap();
    assert_eq!(second.lines[0].key.as_str(), "PIPE|||100");
    assert_eq!(second.lines[0].id, first.lines[0].id);
    assert_eq!(second.new_keys, 0);
}

#[test]
fn quantity_id_is_published_when_property_configured() {
    let mut plant = sample_plant();
    let mut config = AppConfig::default();
    config.storage.id_property = Some("QuantityId".to_string());
    QuantityPass::new(&config).run(&mut plant.doc).unwrap();

    let valve = plant.doc.entity(plant.valve).unwrap();
    assert_eq!(
        valve.properties.get("QuantityId"),
        Some(&PropertyValue::Text("0004".to_string()))
    );
    let gasket = plant.doc.row(RowId::new(20)).unwrap();
    assert!(gasket.properties.contains_key("QuantityId"));
}

#[test]
fn ids_survive_json_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plant.json");
    let config = AppConfig::default();
    let facade = JsonFacade::new();

    let mut plant = sample_plant();
    let first = QuantityPass::new(&config).run(&mut plant.doc).unwrap();
    facade.save(&plant.doc, &path).unwrap();
    assert!(!dir.path().join("plant.json.tmp").exists());

    let mut reloaded = facade.load(&path).unwrap();
    let state = QuantityIdStore::new(&config.storage).load(
        &reloaded,
        config.allocator.max_id,
        config.allocator.start_id,
    );
    assert_eq!(state.next(), first.next_id);
    assert_eq!(state.id_of("PIPE|STW|架設|100"), Some(1));

    let second = QuantityPass::new(&config).run(&mut reloaded).unwrap();
    assert_eq!(second.new_keys, 0);
    let elbow = AggregationTarget::Entity(plant.elbow);
    assert_eq!(
        second.line_for(&elbow).map(|l| l.formatted.clone()),
        first.line_for(&elbow).map(|l| l.formatted.clone())
    );
}

/// 命名对象写入总是失败的宿主。
struct ReadOnlyDictionary(PlantDocument);

impl EntityStore for ReadOnlyDictionary {
    fn entity_ids(&self) -> Vec<EntityId> {
        self.0.entity_ids()
    }

    fn entity(&self, id: EntityId) -> Option<&PlantEntity> {
        EntityStore::entity(&self.0, id)
    }
}

impl PlantPropertyService for ReadOnlyDictionary {
    fn property(&self, target: PropertyTarget, name: &str) -> Option<PropertyValue> {
        self.0.property(target, name)
    }

    fn class_name(&self, target: PropertyTarget) -> Option<String> {
        PlantPropertyService::class_name(&self.0, target)
    }

    fn row_of(&self, entity: EntityId) -> Option<RowId> {
        self.0.row_of(entity)
    }
}

impl RelationshipService for ReadOnlyDictionary {
    fn related(&self, source: RowId, relationship: &str) -> Vec<RowId> {
        RelationshipService::related(&self.0, source, relationship)
    }
}

impl NamedObjectStorage for ReadOnlyDictionary {
    fn read_record(&self, container: &str, name: &str) -> Option<Record> {
        self.0.read_record(container, name)
    }

    fn write_records(
        &mut self,
        _container: &str,
        _writes: Vec<(String, Option<Record>)>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Backend("dictionary is locked".to_string()))
    }
}

impl ExtensionStorage for ReadOnlyDictionary {
    fn read_extension(&self, entity: EntityId, name: &str) -> Option<Record> {
        self.0.read_extension(entity, name)
    }

    fn write_extension(
        &mut self,
        entity: EntityId,
        name: &str,
        record: Record,
    ) -> Result<(), StoreError> {
        self.0.write_extension(entity, name, record)
    }
}

#[test]
fn persistence_failure_still_returns_report() {
    let plant = sample_plant();
    let mut host = ReadOnlyDictionary(plant.doc);
    let config = AppConfig::default();

    let err = QuantityPass::new(&config).run(&mut host).unwrap_err();
    match err {
        EngineError::Persistence { source, report } => {
            assert!(matches!(source, StoreError::Backend(_)));
            assert_eq!(report.lines.len(), 7);
            assert_eq!(report.new_keys, 6);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // 编号表未写回时不刷新实体缓存
    assert!(host.0.entities().all(|(_, entity)| entity.extension.is_empty()));
}
