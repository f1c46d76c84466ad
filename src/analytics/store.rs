//! 访问统计计数器
//!
//! 每个短链接一条 MetricRecord，记录当前窗口内的：
//! - pv：总访问次数
//! - uv：去重后的访客数（按访客 key，一般是客户端 IP）
//!
//! 链接集合在启动时确定，运行期间只读；不同链接之间没有全局锁。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashSet;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use super::StatRecord;

/// 一个统计窗口内的计数
///
/// 记录访问时只需共享锁：pv/uv 是原子量，seen 是并发集合。
struct Window {
    pv: AtomicU64,
    uv: AtomicU64,
    seen: DashSet<Box<str>>,
}

impl Window {
    fn new() -> Self {
        Self {
            pv: AtomicU64::new(0),
            uv: AtomicU64::new(0),
            seen: DashSet::new(),
        }
    }

    fn record(&self, visitor_key: &str) {
        self.pv.fetch_add(1, Ordering::Relaxed);

        // contains 只是快路径，避免热点访客重复分配；
        // 真正决定 uv 是否 +1 的是 insert 的返回值
        if !self.seen.contains(visitor_key) && self.seen.insert(Box::from(visitor_key)) {
            // Release 保证读到这次 uv 的一方也能看到上面的 pv
            self.uv.fetch_add(1, Ordering::Release);
        }
    }
}

/// 单个链接的统计记录
pub struct MetricRecord {
    window: RwLock<Window>,
}

impl MetricRecord {
    fn new() -> Self {
        Self {
            window: RwLock::new(Window::new()),
        }
    }

    /// 读取当前计数（不重置）
    fn snapshot(&self) -> (u64, u64) {
        let window = self.window.read();
        // 先读 uv 再读 pv，保证 uv <= pv
        let uv = window.uv.load(Ordering::Acquire);
        let pv = window.pv.load(Ordering::Relaxed);
        (pv, uv)
    }

    /// 取走当前窗口并换上新窗口
    ///
    /// 独占锁保证并发的 record 要么全部落在旧窗口，要么全部落在新窗口。
    fn take(&self) -> Window {
        std::mem::replace(&mut *self.window.write(), Window::new())
    }
}

/// 访问计数器
///
/// 启动时由已知链接集合构造，之后通过 `Arc` 在路由层和持久化任务之间共享。
pub struct CounterStore {
    links: BTreeMap<Arc<str>, MetricRecord>,
    rejected: AtomicU64,
}

impl CounterStore {
    /// 为每个链接创建一条清零的记录
    pub fn new<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let links: BTreeMap<Arc<str>, MetricRecord> = identifiers
            .into_iter()
            .map(|id| (Arc::from(id.as_ref()), MetricRecord::new()))
            .collect();
        debug!("CounterStore: initialized with {} links", links.len());

        Self {
            links,
            rejected: AtomicU64::new(0),
        }
    }

    /// 记录一次访问
    ///
    /// 未知链接只记一次警告并忽略，不会新建条目。
    pub fn record(&self, id: &str, visitor_key: &str) {
        let Some(metric) = self.links.get(id) else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            warn!("CounterStore: ignored visit for unknown link '{}'", id);
            return;
        };

        metric.window.read().record(visitor_key);
        debug!("CounterStore: record ip {} link {}", visitor_key, id);
    }

    /// 取出所有链接的计数并清零，按链接名排序
    ///
    /// 时间戳在一次 drain 中只取一次，所有记录共享。
    pub fn drain_all(&self) -> Vec<StatRecord> {
        let timestamp = Utc::now();

        let records: Vec<StatRecord> = self
            .links
            .iter()
            .map(|(id, metric)| {
                let window = metric.take();
                StatRecord {
                    id: Arc::clone(id),
                    pv: window.pv.into_inner(),
                    uv: window.uv.into_inner(),
                    timestamp,
                }
            })
            .collect();

        trace!("CounterStore: drained {} links", records.len());
        records
    }

    /// 当前窗口的 (pv, uv)，未知链接返回 None
    pub fn snapshot(&self, id: &str) -> Option<(u64, u64)> {
        self.links.get(id).map(MetricRecord::snapshot)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.links.contains_key(id)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.links.keys().map(|k| k.as_ref())
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// 被忽略的未知链接访问次数
    pub fn rejected_visits(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}
