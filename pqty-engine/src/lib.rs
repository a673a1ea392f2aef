pub mod allocator;
pub mod class;
pub mod collector;
pub mod geometry;
pub mod host;
pub mod key;
pub mod normalize;
pub mod overrides;
pub mod pass;
pub mod property;
pub mod store;

pub mod errors {
    use thiserror::Error;

    use crate::pass::QuantityReport;

    /// 图纸侧持久化存储的写入失败。
    #[derive(Debug, Error)]
    pub enum StoreError {
        #[error("entity with id {0} is missing or erased")]
        EntityUnavailable(u64),
        #[error("property `{property}` is not writable on {target}")]
        PropertyNotWritable { target: String, property: String },
        #[error("storage backend rejected write: {0}")]
        Backend(String),
    }

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error(
            "quantity id capacity exceeded: next id {next} is above the configured maximum {max_id}"
        )]
        CapacityExceeded { max_id: i64, next: i64 },
        #[error("entity with id {0} not found")]
        EntityNotFound(u64),
        /// 收集与分配已完成，但编号表未能写回图纸；报表仍随错误返回。
        #[error("failed to persist quantity ids: {source}")]
        Persistence {
            #[source]
            source: StoreError,
            report: Box<QuantityReport>,
        },
    }
}
