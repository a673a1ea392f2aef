use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub allocator: AllocatorConfig,
    #[serde(default)]
    pub keys: KeyConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `PQTY_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("PQTY_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 数量编号分配器的上下限。`max_id` 同时决定编号的补零位数。
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AllocatorConfig {
    #[serde(default = "AllocatorConfig::default_max_id")]
    pub max_id: i64,
    #[serde(default = "AllocatorConfig::default_start_id")]
    pub start_id: i64,
}

impl AllocatorConfig {
    fn default_max_id() -> i64 {
        9999
    }

    fn default_start_id() -> i64 {
        1
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_id: Self::default_max_id(),
            start_id: Self::default_start_id(),
        }
    }
}

/// 各聚合字段的候选属性名，按顺序尝试，包含本地化名称与别名。
#[derive(Debug, Clone, Deserialize)]
pub struct KeyConfig {
    #[serde(default = "KeyConfig::default_material_code")]
    pub material_code: Vec<String>,
    #[serde(default = "KeyConfig::default_install_method")]
    pub install_method: Vec<String>,
    #[serde(default = "KeyConfig::default_size")]
    pub size: Vec<String>,
    #[serde(default = "KeyConfig::default_angle")]
    pub angle: Vec<String>,
    #[serde(default = "KeyConfig::default_description")]
    pub description: Vec<String>,
    #[serde(default = "KeyConfig::default_item_code")]
    pub item_code: Vec<String>,
    #[serde(default = "KeyConfig::default_part_type")]
    pub part_type: Vec<String>,
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl KeyConfig {
    fn default_material_code() -> Vec<String> {
        names(&["MaterialCode", "Material Code", "材料コード", "材質"])
    }

    fn default_install_method() -> Vec<String> {
        names(&["InstallMethod", "InstallationMethod", "施工方法", "施工区分"])
    }

    fn default_size() -> Vec<String> {
        names(&["Size", "NominalSize", "PartSize", "呼び径", "サイズ"])
    }

    fn default_angle() -> Vec<String> {
        names(&["Angle", "BendAngle", "角度"])
    }

    fn default_description() -> Vec<String> {
        names(&["Description", "PartFamilyLongDesc", "説明", "名称"])
    }

    fn default_item_code() -> Vec<String> {
        names(&["ItemCode", "Item Code", "品目コード"])
    }

    fn default_part_type() -> Vec<String> {
        names(&["PartType", "部品種別"])
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            material_code: Self::default_material_code(),
            install_method: Self::default_install_method(),
            size: Self::default_size(),
            angle: Self::default_angle(),
            description: Self::default_description(),
            item_code: Self::default_item_code(),
            part_type: Self::default_part_type(),
        }
    }
}

/// 聚合对象的收集规则。
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// 从连接件行出发查找紧固件行时使用的关系名。
    #[serde(default = "CollectorConfig::default_fastener_relationships")]
    pub fastener_relationships: Vec<String>,
    /// 类名包含这些片段的实体视为连接件，本身不计数。
    #[serde(default = "CollectorConfig::default_connector_classes")]
    pub connector_classes: Vec<String>,
    /// 类名包含这些片段的实体完全不参与统计。
    #[serde(default)]
    pub excluded_classes: Vec<String>,
}

impl CollectorConfig {
    fn default_fastener_relationships() -> Vec<String> {
        names(&["ConnectorFastener", "GasketConnection", "BoltSetConnection"])
    }

    fn default_connector_classes() -> Vec<String> {
        names(&["Connector"])
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            fastener_relationships: Self::default_fastener_relationships(),
            connector_classes: Self::default_connector_classes(),
            excluded_classes: Vec::new(),
        }
    }
}

/// 图纸内持久化记录的名称。
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "StorageConfig::default_container")]
    pub container: String,
    #[serde(default = "StorageConfig::default_map_record")]
    pub map_record: String,
    #[serde(default = "StorageConfig::default_next_record")]
    pub next_record: String,
    /// 旧版换行分隔文本格式的记录名，仅用于一次性迁移。
    #[serde(default = "StorageConfig::default_legacy_map_record")]
    pub legacy_map_record: String,
    /// 实体扩展字典中缓存数量编号的记录名。
    #[serde(default = "StorageConfig::default_entity_record")]
    pub entity_record: String,
    /// 回写数量编号的工厂属性名；为空时只写实体扩展字典。
    #[serde(default)]
    pub id_property: Option<String>,
}

impl StorageConfig {
    fn default_container() -> String {
        "PQTY_QUANTITY_ID".to_string()
    }

    fn default_map_record() -> String {
        "KEY_MAP".to_string()
    }

    fn default_next_record() -> String {
        "NEXT_ID".to_string()
    }

    fn default_legacy_map_record() -> String {
        "KEY_MAP_TEXT".to_string()
    }

    fn default_entity_record() -> String {
        "PQTY_QUANTITY".to_string()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            container: Self::default_container(),
            map_record: Self::default_map_record(),
            next_record: Self::default_next_record(),
            legacy_map_record: Self::default_legacy_map_record(),
            entity_record: Self::default_entity_record(),
            id_property: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
