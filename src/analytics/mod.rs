pub mod persistence;
pub mod sink;
pub mod store;

pub use persistence::{FlushSummary, LoopState, PersistenceHandle, PersistenceLoop};
pub use sink::{CsvFileSink, StatsSink};
pub use store::CounterStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// 一次 drain 得到的单个链接统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRecord {
    /// 短链接标识
    pub id: Arc<str>,
    /// 窗口内总访问数
    pub pv: u64,
    /// 窗口内去重访客数
    pub uv: u64,
    /// drain 发生的时间（同一次 drain 共享）
    pub timestamp: DateTime<Utc>,
}
