use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::analytics::{
    CounterStore, CsvFileSink, PersistenceHandle, PersistenceLoop, StatsSink,
};
use crate::api::services::RedirectState;
use crate::config::StaticConfig;
use crate::utils::ip::TrustedProxies;

pub struct StartupContext {
    pub store: Arc<CounterStore>,
    pub persistence: PersistenceHandle,
    pub redirect_state: web::Data<RedirectState>,
}

/// 准备服务器启动的上下文
///
/// 计数器必须在服务器开始接收请求之前建好；持久化任务会被 spawn 到当前
/// tokio runtime 上，所以需要在 runtime 内调用。
pub fn prepare_server_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    if config.links.is_empty() {
        warn!("No short links configured, every request will go to the not-found page");
    }

    // 链接集合启动后只读
    let store = Arc::new(CounterStore::new(config.links.keys()));

    let sink: Arc<dyn StatsSink> = Arc::new(
        CsvFileSink::new(&config.stats.dir).context("Failed to create stats sink")?,
    );
    info!("Stats directory: {}", config.stats.dir.display());

    let persistence = Arc::new(PersistenceLoop::new(
        Arc::clone(&store),
        sink,
        Duration::from_secs(config.stats.period_secs),
    ))
    .spawn(config.stats.flush_on_shutdown);

    let trusted_proxies = TrustedProxies::parse(&config.server.trusted_proxies);
    if trusted_proxies.is_empty() {
        debug!("No trusted proxies configured, auto-detecting proxies on private addresses");
    }

    let links: HashMap<String, String> = config
        .links
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let redirect_state = web::Data::new(RedirectState::new(
        links,
        config.redirect.not_found_url.clone(),
        trusted_proxies,
        Arc::clone(&store),
    ));

    info!(
        "Loaded {} short links, pre-startup completed in {} ms",
        store.len(),
        start_time.elapsed().as_millis()
    );

    Ok(StartupContext {
        store,
        persistence,
        redirect_state,
    })
}
