//! 多候选名的属性解析。

use pqty_core::document::PropertyValue;
use tracing::trace;

use crate::collector::AggregationTarget;
use crate::host::{PlantPropertyService, PropertyTarget};
use crate::normalize::format_number;

/// 把属性值渲染成字符串；空白或非有限数值视为缺失。
pub fn render_value(value: &PropertyValue) -> Option<String> {
    let rendered = match value {
        PropertyValue::Text(text) => text.trim().to_string(),
        PropertyValue::Integer(value) => value.to_string(),
        PropertyValue::Real(value) => format_number(*value),
        PropertyValue::Bool(value) => value.to_string(),
    };
    if rendered.is_empty() { None } else { Some(rendered) }
}

pub struct PropertyResolver<'a, H: ?Sized> {
    host: &'a H,
}

impl<'a, H> PropertyResolver<'a, H>
where
    H: PlantPropertyService + ?Sized,
{
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// 依次尝试的寻址方式：实体本身，其次是实体对应的数据行。
    pub fn lookup_targets(&self, target: &AggregationTarget) -> Vec<PropertyTarget> {
        match target {
            AggregationTarget::Entity(id) => {
                let mut targets = vec![PropertyTarget::Entity(*id)];
                if let Some(row) = self.host.row_of(*id) {
                    targets.push(PropertyTarget::Row(row));
                }
                targets
            }
            AggregationTarget::Fastener { row, .. } => vec![PropertyTarget::Row(*row)],
        }
    }

    /// 在单个寻址上按候选名顺序查找：先取原始值，再取本地化显示值。
    pub fn resolve_at(&self, target: PropertyTarget, candidates: &[String]) -> Option<String> {
        for name in candidates {
            if let Some(value) = self
                .host
                .property(target, name)
                .as_ref()
                .and_then(render_value)
            {
                return Some(value);
            }
            if let Some(value) = self
                .host
                .display_property(target, name)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
            {
                return Some(value);
            }
        }
        None
    }

    /// 返回第一个非空值。
    pub fn resolve(&self, target: &AggregationTarget, candidates: &[String]) -> Option<String> {
        let found = self
            .lookup_targets(target)
            .into_iter()
            .find_map(|lookup| self.resolve_at(lookup, candidates));
        if found.is_none() {
            trace!(%target, ?candidates, "未找到属性值");
        }
        found
    }

    /// 同 [`resolve`](Self::resolve)，缺失时返回空串。
    pub fn resolve_or_empty(&self, target: &AggregationTarget, candidates: &[String]) -> String {
        self.resolve(target, candidates).unwrap_or_default()
    }

    pub fn class_name(&self, target: &AggregationTarget) -> String {
        self.lookup_targets(target)
            .into_iter()
            .find_map(|lookup| self.host.class_name(lookup))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use pqty_core::document::{PlantDocument, PlantEntity, PlantRow, RowId};

    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn first_non_empty_candidate_wins() {
        let mut doc = PlantDocument::new("props");
        let id = doc.add_entity(
            PlantEntity::new("Pipe")
                .with_property("MaterialCode", "  ")
                .with_property("材料コード", "STW"),
        );
        let resolver = PropertyResolver::new(&doc);
        let target = AggregationTarget::Entity(id);
        assert_eq!(
            resolver.resolve(&target, &names(&["MaterialCode", "材料コード"])),
            Some("STW".to_string())
        );
        assert_eq!(resolver.resolve(&target, &names(&["Missing"])), None);
        assert_eq!(resolver.resolve_or_empty(&target, &names(&["Missing"])), "");
    }

    #[test]
    fn numeric_values_render_canonically() {
        let mut doc = PlantDocument::new("props");
        let id = doc.add_entity(
            PlantEntity::new("Elbow")
                .with_property("Angle", 90.0)
                .with_property("Size", 50_i64),
        );
        let resolver = PropertyResolver::new(&doc);
        let target = AggregationTarget::Entity(id);
        assert_eq!(resolver.resolve(&target, &names(&["Angle"])).as_deref(), Some("90"));
        assert_eq!(resolver.resolve(&target, &names(&["Size"])).as_deref(), Some("50"));
    }

    #[test]
    fn display_value_and_row_fallbacks() {
        let mut doc = PlantDocument::new("props");
        doc.add_row(PlantRow::new(RowId::new(5), "Pipe").with_property("ItemCode", "P-100"));
        let id = doc.add_entity(
            PlantEntity::new("Pipe")
                .with_row(RowId::new(5))
                .with_display_property("InstallMethod", "架設"),
        );
        let resolver = PropertyResolver::new(&doc);
        let target = AggregationTarget::Entity(id);
        assert_eq!(
            resolver.resolve(&target, &names(&["InstallMethod"])).as_deref(),
            Some("架設")
        );
        assert_eq!(
            resolver.resolve(&target, &names(&["ItemCode"])).as_deref(),
            Some("P-100")
        );
        assert_eq!(resolver.class_name(&target), "Pipe");
    }

    #[test]
    fn render_value_rejects_empty_and_non_finite() {
        assert_eq!(render_value(&PropertyValue::Text(" ".into())), None);
        assert_eq!(render_value(&PropertyValue::Real(f64::NAN)), None);
        assert_eq!(
            render_value(&PropertyValue::Bool(true)).as_deref(),
            Some("true")
        );
    }
}
