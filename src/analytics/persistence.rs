//! 统计持久化任务
//!
//! 固定周期运行：sleep -> drain -> 逐条写入 Sink -> sleep ...
//! - 单个链接写入失败只记录日志，继续处理其余链接
//! - 任务本身不会因错误退出，只响应 CancellationToken
//! - 关闭时可以再做一次 flush，避免丢掉最后一个窗口

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{CounterStore, StatsSink};

/// 持久化任务当前所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Sleeping,
    Draining,
}

/// 一次 flush 的结果
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushSummary {
    pub persisted: usize,
    pub failed: usize,
}

pub struct PersistenceLoop {
    store: Arc<CounterStore>,
    sink: Arc<dyn StatsSink>,
    period: Duration,
    /// 正在执行的 flush 数量，`flush_once` 可能与后台循环重叠
    in_flight: AtomicUsize,
}

impl PersistenceLoop {
    pub fn new(store: Arc<CounterStore>, sink: Arc<dyn StatsSink>, period: Duration) -> Self {
        Self {
            store,
            sink,
            period,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> LoopState {
        if self.in_flight.load(Ordering::Acquire) > 0 {
            LoopState::Draining
        } else {
            LoopState::Sleeping
        }
    }

    /// 执行一次 drain 并写入 Sink
    pub async fn flush_once(&self) -> FlushSummary {
        self.in_flight.fetch_add(1, Ordering::AcqRel);

        let records = self.store.drain_all();
        let mut summary = FlushSummary::default();

        for record in &records {
            match self.sink.append(record).await {
                Ok(()) => {
                    trace!(
                        "PersistenceLoop: persisted {} pv={} uv={}",
                        record.id, record.pv, record.uv
                    );
                    summary.persisted += 1;
                }
                Err(e) => {
                    // 不重试，下个周期的新计数自然会再次写入
                    error!(
                        "PersistenceLoop: cannot persist stats for '{}': {:#}",
                        record.id, e
                    );
                    summary.failed += 1;
                }
            }
        }

        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        summary
    }

    /// 定时刷盘，直到 token 被取消
    ///
    /// 取消只会打断 sleep；已经开始的写入会完整跑完。
    pub async fn run(&self, token: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("PersistenceLoop: cancellation received, stopping");
                    break;
                }
                _ = sleep(self.period) => {}
            }

            debug!("PersistenceLoop: Triggering scheduled flush");
            let summary = self.flush_once().await;
            if summary.failed > 0 {
                warn!(
                    "PersistenceLoop: flush finished with {} failures ({} persisted)",
                    summary.failed, summary.persisted
                );
            } else {
                debug!(
                    "PersistenceLoop: Successfully flushed {} entries",
                    summary.persisted
                );
            }
        }
    }

    /// 在后台启动持久化任务
    pub fn spawn(self: Arc<Self>, flush_on_shutdown: bool) -> PersistenceHandle {
        let token = CancellationToken::new();
        let task = {
            let persistence = Arc::clone(&self);
            let token = token.clone();
            tokio::spawn(async move { persistence.run(token).await })
        };
        info!(
            "Stats persistence started, period {}s",
            self.period.as_secs()
        );

        PersistenceHandle {
            persistence: self,
            token,
            task,
            flush_on_shutdown,
        }
    }
}

/// 后台持久化任务的句柄
pub struct PersistenceHandle {
    persistence: Arc<PersistenceLoop>,
    token: CancellationToken,
    task: JoinHandle<()>,
    flush_on_shutdown: bool,
}

impl PersistenceHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 停止后台任务，按配置做最后一次 flush
    pub async fn shutdown(self) -> Option<FlushSummary> {
        self.token.cancel();
        if let Err(e) = self.task.await {
            error!("PersistenceLoop: background task ended abnormally: {}", e);
        }

        if !self.flush_on_shutdown {
            return None;
        }
        let summary = self.persistence.flush_once().await;
        info!(
            "Final stats flush: {} persisted, {} failed",
            summary.persisted, summary.failed
        );
        Some(summary)
    }
}
