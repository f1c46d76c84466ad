use std::path::PathBuf;

use anyhow::Context;
use chrono::SecondsFormat;
use csv::{Terminator, WriterBuilder};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use super::StatRecord;

/// 统计结果 Sink
///
/// 每次调用只处理一个链接，单个链接写入失败不会影响其他链接。
#[async_trait::async_trait]
pub trait StatsSink: Send + Sync {
    async fn append(&self, record: &StatRecord) -> anyhow::Result<()>;
}

/// 把一条记录格式化为 `timestamp,pv,uv\n`
///
/// 时间戳为 UTC RFC 3339（毫秒精度），定长，可直接按字典序排序。
pub fn format_record_line(record: &StatRecord) -> anyhow::Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(48));

    writer.write_record([
        record
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        record.pv.to_string(),
        record.uv.to_string(),
    ])?;

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush csv line: {}", e.error()))
}

/// 每个链接一个追加写的 CSV 文件：`<dir>/<id>.csv`
pub struct CsvFileSink {
    dir: PathBuf,
}

impl CsvFileSink {
    /// 创建 Sink，目录不存在时自动创建
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create stats directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", id))
    }
}

#[async_trait::async_trait]
impl StatsSink for CsvFileSink {
    async fn append(&self, record: &StatRecord) -> anyhow::Result<()> {
        let path = self.path_for(&record.id);
        let line = format_record_line(record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("cannot open stats: {}", path.display()))?;

        file.write_all(&line)
            .await
            .with_context(|| format!("cannot write stats: {}", path.display()))?;
        // tokio 的 File 在后台线程写入，flush 之后才能拿到写入错误
        file.flush()
            .await
            .with_context(|| format!("cannot write stats: {}", path.display()))?;

        Ok(())
    }
}
