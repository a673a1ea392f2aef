//! 代表点、端口布局与公称直径的提取。

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use pqty_core::document::{PlantEntity, Port};
use pqty_core::geometry::Point3;
use regex::Regex;

use crate::class::EntityClass;

/// 端口布局固定为四个槽位。
pub const PORT_SLOTS: usize = 4;

static PORT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\D*?)(\d+)$").expect("port name pattern is valid"));

/// 起点、终点、分支、次分支。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PortLayout {
    pub slots: [Option<Point3>; PORT_SLOTS],
}

impl PortLayout {
    #[inline]
    pub fn start(&self) -> Option<Point3> {
        self.slots[0]
    }

    #[inline]
    pub fn end(&self) -> Option<Point3> {
        self.slots[1]
    }

    #[inline]
    pub fn branch(&self) -> Option<Point3> {
        self.slots[2]
    }

    #[inline]
    pub fn secondary_branch(&self) -> Option<Point3> {
        self.slots[3]
    }
}

/// 按端口名排序后的前三个公称直径。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NominalDiameters {
    pub nd1: Option<f64>,
    pub nd2: Option<f64>,
    pub nd3: Option<f64>,
}

/// 一个实体的几何摘要。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Extraction {
    pub layout: PortLayout,
    pub mid: Option<Point3>,
    pub diameters: NominalDiameters,
    /// 起终点距离，用于管道长度累计。
    pub length: Option<f64>,
    /// 由中心与两端口推算的弯曲角度（度）。
    pub bend_angle: Option<f64>,
}

pub fn extract(class: EntityClass, entity: &PlantEntity) -> Extraction {
    let layout = port_layout(entity);
    let start = entity.geometry.start.or(layout.start());
    let end = entity.geometry.end.or(layout.end());
    Extraction {
        layout,
        mid: representative_point(class, entity, start, end),
        diameters: ordered_diameters(&entity.ports),
        length: match (start, end) {
            (Some(a), Some(b)) => Some(a.distance(b)).filter(|len| len.is_finite()),
            _ => None,
        },
        bend_angle: bend_angle(entity, &layout),
    }
}

/// 端口按实体暴露的顺序放入四个槽位，多余的截断，不足的留空。
pub fn port_layout(entity: &PlantEntity) -> PortLayout {
    let mut layout = PortLayout::default();
    for (slot, port) in layout.slots.iter_mut().zip(entity.ports.iter()) {
        *slot = port.position;
    }
    layout
}

/// 各类实体的代表点规则，最后统一回退到起终点中点。
pub fn representative_point(
    class: EntityClass,
    entity: &PlantEntity,
    start: Option<Point3>,
    end: Option<Point3>,
) -> Option<Point3> {
    let geometry = &entity.geometry;
    let by_class = match class {
        EntityClass::Valve | EntityClass::Reducer => geometry.center_of_gravity,
        EntityClass::Elbow => geometry.center,
        EntityClass::Tee => geometry.branch_point,
        _ => geometry.position,
    };
    by_class.filter(|p| p.is_finite()).or_else(|| match (start, end) {
        (Some(a), Some(b)) => Some(a.midpoint(b)),
        _ => None,
    })
}

/// 端口名的排序键：带数字后缀的按数值排在前面，其余按字典序排在后面。
fn port_order(a: &Port, b: &Port) -> Ordering {
    match (port_suffix(&a.name), port_suffix(&b.name)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
    }
}

pub fn port_suffix(name: &str) -> Option<u64> {
    let caps = PORT_NAME.captures(name.trim())?;
    caps[2].parse().ok()
}

pub fn ordered_diameters(ports: &[Port]) -> NominalDiameters {
    let mut sorted: Vec<&Port> = ports.iter().collect();
    sorted.sort_by(|a, b| port_order(a, b));
    let mut values = sorted
        .into_iter()
        .filter_map(|port| port.nominal_diameter)
        .filter(|nd| nd.is_finite() && *nd > 0.0);
    NominalDiameters {
        nd1: values.next(),
        nd2: values.next(),
        nd3: values.next(),
    }
}

/// 弯头角度：`180° - ∠(S1 - C, S2 - C)`，缺少中心或端口时返回 `None`。
fn bend_angle(entity: &PlantEntity, layout: &PortLayout) -> Option<f64> {
    let center = entity.geometry.center?;
    let a = center.vector_to(layout.start()?);
    let b = center.vector_to(layout.end()?);
    let between = a.angle_degrees(b)?;
    Some(180.0 - between)
}
