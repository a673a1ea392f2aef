//! 聚合键的构造。
//!
//! 键由 `|` 分隔的字段组成，首字段为类别标记。相关属性相同的两个对象必须得到相同的键，
//! 这是数量汇总的前提。

use std::fmt;

use once_cell::sync::Lazy;
use pqty_config::KeyConfig;
use regex::Regex;

use crate::class::EntityClass;
use crate::collector::AggregationTarget;
use crate::errors::EngineError;
use crate::geometry::{self, Extraction, NominalDiameters};
use crate::host::{EntityStore, PlantPropertyService};
use crate::normalize::{KEY_DELIMITER, format_number, join_fields, normalize_number, normalize_text};
use crate::property::PropertyResolver;

static SIZE_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*[xX×*]\s*(\d+(?:\.\d+)?)\s*$")
        .expect("size pair pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCategory {
    Pipe,
    Elbow,
    Tee,
    Fastener,
    Joint,
    Asset,
    Unknown,
}

impl KeyCategory {
    pub fn tag(self) -> &'static str {
        match self {
            KeyCategory::Pipe => "PIPE",
            KeyCategory::Elbow => "ELBOW",
            KeyCategory::Tee => "TEE",
            KeyCategory::Fastener => "FASTENER",
            KeyCategory::Joint => "JOINT",
            KeyCategory::Asset => "ASSET",
            KeyCategory::Unknown => "UNKNOWN",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "PIPE" => KeyCategory::Pipe,
            "ELBOW" => KeyCategory::Elbow,
            "TEE" => KeyCategory::Tee,
            "FASTENER" => KeyCategory::Fastener,
            "JOINT" => KeyCategory::Joint,
            "ASSET" => KeyCategory::Asset,
            "UNKNOWN" => KeyCategory::Unknown,
            _ => return None,
        })
    }
}

/// 规范化后的聚合键。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregationKey(String);

impl AggregationKey {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn category(&self) -> Option<KeyCategory> {
        self.fields().next().and_then(KeyCategory::from_tag)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.split(KEY_DELIMITER)
    }
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AggregationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 构造键所需的已解析属性（原始字符串，构造时再规范化）。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyInputs {
    pub class_name: String,
    pub material_code: String,
    pub install_method: String,
    pub size: String,
    pub angle: String,
    pub description: String,
    pub item_code: String,
    pub diameters: NominalDiameters,
    /// 对象标识，仅在 `UNKNOWN` 键中使用。
    pub identity: String,
}

fn first_non_empty<'s>(candidates: &[&'s str]) -> Option<&'s str> {
    candidates
        .iter()
        .copied()
        .map(str::trim)
        .find(|value| !value.is_empty())
}

impl KeyInputs {
    fn desc_or_item(&self) -> String {
        let chosen = first_non_empty(&[
            self.description.as_str(),
            self.item_code.as_str(),
            self.class_name.as_str(),
        ]);
        normalize_text(chosen.unwrap_or_default())
    }

    fn item_or_desc(&self) -> String {
        let chosen = first_non_empty(&[
            self.item_code.as_str(),
            self.description.as_str(),
            self.class_name.as_str(),
        ]);
        normalize_text(chosen.unwrap_or_default())
    }

    fn install(&self) -> String {
        normalize_text(&self.install_method)
    }

    /// 尺寸字段为空时退回到第一个端口的公称直径。
    fn size(&self) -> String {
        let size = normalize_number(&self.size);
        if size.is_empty() {
            self.diameters.nd1.map(format_number).unwrap_or_default()
        } else {
            size
        }
    }

    /// 三通的主管 × 支管直径：优先使用端口直径，其次解析 `NxM` 形式的尺寸串。
    pub fn run_branch(&self) -> Option<(String, String)> {
        if let (Some(run), Some(branch)) = (self.diameters.nd1, self.diameters.nd3) {
            return Some((format_number(run), format_number(branch)));
        }
        let caps = SIZE_PAIR.captures(&self.size)?;
        Some((normalize_number(&caps[1]), normalize_number(&caps[2])))
    }

    fn has_descriptor(&self) -> bool {
        first_non_empty(&[self.description.as_str(), self.item_code.as_str()]).is_some()
    }
}

/// 纯函数：按实体类别生成聚合键。
pub fn build_key(class: EntityClass, inputs: &KeyInputs) -> AggregationKey {
    let category = match class {
        EntityClass::Pipe => KeyCategory::Pipe,
        EntityClass::Elbow => KeyCategory::Elbow,
        EntityClass::Tee => KeyCategory::Tee,
        EntityClass::Fastener => KeyCategory::Fastener,
        EntityClass::Joint => KeyCategory::Joint,
        EntityClass::Unknown if !inputs.has_descriptor() => KeyCategory::Unknown,
        _ => KeyCategory::Asset,
    };

    let tag = category.tag().to_string();
    let fields = match category {
        KeyCategory::Pipe => vec![
            tag,
            normalize_text(&inputs.material_code),
            inputs.install(),
            inputs.size(),
        ],
        KeyCategory::Elbow => vec![
            tag,
            inputs.desc_or_item(),
            inputs.install(),
            inputs.size(),
            normalize_number(&inputs.angle),
        ],
        KeyCategory::Tee => {
            let size = match inputs.run_branch() {
                Some((run, branch)) => format!("{run}x{branch}"),
                None => inputs.size(),
            };
            vec![tag, inputs.desc_or_item(), inputs.install(), size]
        }
        KeyCategory::Fastener | KeyCategory::Joint | KeyCategory::Asset => vec![
            tag,
            inputs.item_or_desc(),
            inputs.install(),
            inputs.size(),
        ],
        KeyCategory::Unknown => vec![tag, inputs.install(), normalize_text(&inputs.identity)],
    };
    AggregationKey(join_fields(fields))
}

/// 一个对象的键及其派生上下文。
#[derive(Debug, Clone)]
pub struct DerivedKey {
    pub target: AggregationTarget,
    pub class: EntityClass,
    pub key: AggregationKey,
    pub extraction: Extraction,
}

/// 把属性解析、几何提取与键构造串起来。
pub struct KeyDeriver<'a, H: ?Sized> {
    host: &'a H,
    names: &'a KeyConfig,
}

impl<'a, H> KeyDeriver<'a, H>
where
    H: EntityStore + PlantPropertyService + ?Sized,
{
    pub fn new(host: &'a H, names: &'a KeyConfig) -> Self {
        Self { host, names }
    }

    pub fn derive(&self, target: AggregationTarget) -> Result<DerivedKey, EngineError> {
        let resolver = PropertyResolver::new(self.host);
        let class_name = resolver.class_name(&target);
        let part_type = resolver.resolve(&target, &self.names.part_type);
        let class = EntityClass::classify(&class_name, part_type.as_deref());

        let extraction = match target {
            AggregationTarget::Entity(id) => {
                let entity = self
                    .host
                    .entity(id)
                    .filter(|entity| !entity.erased)
                    .ok_or(EngineError::EntityNotFound(id.get()))?;
                geometry::extract(class, entity)
            }
            AggregationTarget::Fastener { .. } => Extraction::default(),
        };

        let mut angle = resolver.resolve_or_empty(&target, &self.names.angle);
        if angle.is_empty() && class == EntityClass::Elbow {
            angle = extraction
                .bend_angle
                .map(|value| format_number(value.round()))
                .unwrap_or_default();
        }

        let inputs = KeyInputs {
            class_name,
            material_code: resolver.resolve_or_empty(&target, &self.names.material_code),
            install_method: resolver.resolve_or_empty(&target, &self.names.install_method),
            size: resolver.resolve_or_empty(&target, &self.names.size),
            angle,
            description: resolver.resolve_or_empty(&target, &self.names.description),
            item_code: resolver.resolve_or_empty(&target, &self.names.item_code),
            diameters: extraction.diameters,
            identity: target.to_string(),
        };

        Ok(DerivedKey {
            target,
            class,
            key: build_key(class, &inputs),
            extraction,
        })
    }
}
