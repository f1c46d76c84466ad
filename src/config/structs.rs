use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::validators::validate_config;
use crate::errors::{Result, ShortstatError};

/// 环境变量前缀，示例：SHORTSTAT__SERVER__PORT=9999
pub const ENV_PREFIX: &str = "SHORTSTAT";

/// 服务运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    /// 打印每个请求的访问日志
    Debug,
    #[default]
    Release,
}

/// 静态配置（启动时从配置文件加载，运行期间不变）
///
/// 包含：
/// - server: 监听地址、端口、路由前缀、可信代理
/// - redirect: 未命中时的跳转地址
/// - links: 短链接表（标识 -> 目标 URL）
/// - stats: 统计持久化配置
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub redirect: RedirectConfig,
    #[serde(default, alias = "short")]
    pub links: BTreeMap<String, String>,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从配置文件和环境变量加载配置并校验
    ///
    /// 优先级：ENV > 配置文件 > 默认值
    /// 文件格式按扩展名识别（yaml / yml / toml / json）
    pub fn load(path: &Path) -> Result<Self> {
        use config::{Config, Environment, File};

        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(ShortstatError::file_operation(format!(
                    "configuration path is not a file: {}",
                    path.display()
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ShortstatError::not_found(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
            Err(e) => {
                return Err(ShortstatError::file_operation(format!(
                    "cannot read configuration file {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        let settings = Config::builder()
            .add_source(File::from(path).required(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.trusted_proxies"),
            )
            .build()?;

        let config: StaticConfig = settings.try_deserialize()?;
        validate_config(&config)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub mode: ServerMode,
    /// 短链接路由前缀，空字符串表示挂在根路径
    pub route_prefix: String,
    /// 可信代理（IP 或 CIDR）；为空时自动信任私有地址
    pub trusted_proxies: Vec<String>,
    /// HTTP worker 数量，未设置时使用 actix 默认值
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            mode: ServerMode::default(),
            route_prefix: "/s".to_string(),
            trusted_proxies: Vec::new(),
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RedirectConfig {
    /// 未知短链接和未匹配路由的跳转目标
    pub not_found_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// 统计文件目录，每个链接一个 `<id>.csv`
    pub dir: PathBuf,
    /// 统计窗口长度（秒）
    pub period_secs: u64,
    /// 关闭时是否写入最后一个未满的窗口
    pub flush_on_shutdown: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./stats"),
            period_secs: 600,
            flush_on_shutdown: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` 或 `json`
    pub format: String,
    pub file: Option<String>,
    pub enable_rotation: bool,
    pub max_backups: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file: None,
            enable_rotation: false,
            max_backups: 5,
        }
    }
}
