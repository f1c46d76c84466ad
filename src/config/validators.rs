//! 配置校验
//!
//! 链接标识会直接用作统计文件名：只允许字母、数字、`_`、`.` 和 `-`，
//! 并且不能是 `.` 或 `..`。

use url::Url;

use super::StaticConfig;
use crate::errors::{Result, ShortstatError};

const MAX_IDENTIFIER_LEN: usize = 128;

/// 检查链接标识是否合法
pub fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && id.len() <= MAX_IDENTIFIER_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

/// 检查跳转目标是否为 http(s) 绝对地址
pub fn validate_target_url(target: &str) -> std::result::Result<(), String> {
    let url = Url::parse(target).map_err(|e| format!("invalid URL '{}': {}", target, e))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(format!(
            "unsupported scheme '{}' in '{}', only http and https are allowed",
            scheme, target
        )),
    }
}

/// 路由前缀为空，或以 `/` 开头且不以 `/` 结尾
pub fn is_valid_route_prefix(prefix: &str) -> bool {
    prefix.is_empty() || (prefix.starts_with('/') && !prefix.ends_with('/'))
}

pub fn validate_config(config: &StaticConfig) -> Result<()> {
    if config.redirect.not_found_url.is_empty() {
        return Err(ShortstatError::validation(
            "redirect.not_found_url must be set",
        ));
    }
    validate_target_url(&config.redirect.not_found_url)
        .map_err(|e| ShortstatError::validation(format!("redirect.not_found_url: {}", e)))?;

    if !is_valid_route_prefix(&config.server.route_prefix) {
        return Err(ShortstatError::validation(format!(
            "server.route_prefix '{}' must start with '/' and must not end with '/'",
            config.server.route_prefix
        )));
    }

    if config.stats.period_secs == 0 {
        return Err(ShortstatError::validation(
            "stats.period_secs must be greater than 0",
        ));
    }

    for (id, target) in &config.links {
        if !is_valid_identifier(id) {
            return Err(ShortstatError::validation(format!(
                "invalid link identifier '{}': use letters, digits, '_', '.' or '-'",
                id
            )));
        }
        validate_target_url(target)
            .map_err(|e| ShortstatError::validation(format!("link '{}': {}", id, e)))?;
    }

    Ok(())
}
