//! 统计持久化端到端测试
//!
//! 覆盖 CounterStore + CsvFileSink + PersistenceLoop 的完整链路。

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use shortstat::analytics::{CounterStore, CsvFileSink, FlushSummary, PersistenceLoop, StatsSink};

fn setup(
    ids: &[&str],
    period: Duration,
) -> (
    Arc<CounterStore>,
    Arc<CsvFileSink>,
    Arc<PersistenceLoop>,
    TempDir,
) {
    let td = TempDir::new().unwrap();
    let store = Arc::new(CounterStore::new(ids.iter().copied()));
    let sink = Arc::new(CsvFileSink::new(td.path().join("stats")).unwrap());
    let persistence = Arc::new(PersistenceLoop::new(
        Arc::clone(&store),
        Arc::clone(&sink) as Arc<dyn StatsSink>,
        period,
    ));
    (store, sink, persistence, td)
}

/// 解析 `timestamp,pv,uv` 行
fn read_lines(sink: &CsvFileSink, id: &str) -> Vec<(String, u64, u64)> {
    let content = std::fs::read_to_string(sink.path_for(id)).unwrap_or_default();
    content
        .lines()
        .map(|line| {
            let parts: Vec<&str> = line.split(',').collect();
            assert_eq!(parts.len(), 3, "malformed line: {}", line);
            (
                parts[0].to_string(),
                parts[1].parse().unwrap(),
                parts[2].parse().unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_scenario_written_to_csv() {
    let (store, sink, persistence, _td) = setup(&["a", "b"], Duration::from_secs(600));

    for _ in 0..3 {
        store.record("a", "1.1.1.1");
    }
    store.record("a", "2.2.2.2");
    store.record("b", "1.1.1.1");

    assert_eq!(
        persistence.flush_once().await,
        FlushSummary { persisted: 2, failed: 0 }
    );
    persistence.flush_once().await;

    let a = read_lines(&sink, "a");
    let b = read_lines(&sink, "b");
    assert_eq!(
        a.iter().map(|(_, pv, uv)| (*pv, *uv)).collect::<Vec<_>>(),
        vec![(4, 2), (0, 0)]
    );
    assert_eq!(
        b.iter().map(|(_, pv, uv)| (*pv, *uv)).collect::<Vec<_>>(),
        vec![(1, 1), (0, 0)]
    );

    // 同一次 drain 的时间戳一致，且按字典序递增
    assert_eq!(a[0].0, b[0].0);
    assert!(a[0].0 <= a[1].0);
    assert!(a[0].0.ends_with('Z'));
}

#[tokio::test]
async fn test_one_broken_file_does_not_block_others() {
    let (store, sink, persistence, _td) = setup(&["a", "b", "c"], Duration::from_secs(600));
    std::fs::create_dir(sink.path_for("b")).unwrap();

    store.record("a", "1");
    store.record("b", "1");
    store.record("c", "1");

    let summary = persistence.flush_once().await;

    assert_eq!(summary, FlushSummary { persisted: 2, failed: 1 });
    assert_eq!(read_lines(&sink, "a").len(), 1);
    assert_eq!(read_lines(&sink, "c").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_background_loop_loses_no_visits() {
    const NUM_TASKS: usize = 8;
    const VISITS_PER_TASK: u64 = 500;

    let (store, sink, persistence, _td) = setup(&["a", "b"], Duration::from_millis(10));
    let handle = Arc::clone(&persistence).spawn(true);

    let mut tasks = vec![];
    for t in 0..NUM_TASKS {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            for i in 0..VISITS_PER_TASK {
                store.record("a", &format!("10.0.{}.{}", t, i % 10));
                if i % 50 == 0 {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let summary = handle.shutdown().await.unwrap();
    assert_eq!(summary.failed, 0);

    let lines = read_lines(&sink, "a");
    let total_pv: u64 = lines.iter().map(|(_, pv, _)| pv).sum();
    assert_eq!(total_pv, NUM_TASKS as u64 * VISITS_PER_TASK);
    for (_, pv, uv) in &lines {
        assert!(uv <= pv);
        assert!(*uv <= (NUM_TASKS * 10) as u64);
    }

    // b 没有访问，但每个周期都会写一行 0
    assert!(read_lines(&sink, "b").iter().all(|(_, pv, uv)| *pv == 0 && *uv == 0));
    assert!(store.snapshot("a") == Some((0, 0)));
}
