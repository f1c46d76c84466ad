//! 客户端 IP 提取
//!
//! 访客 key 使用客户端 IP。位于反向代理之后时，从转发头
//! （X-Forwarded-For / Forwarded / X-Real-IP）里取真实 IP：
//! - 配置了可信代理：只有来自可信代理的连接才读取转发头
//! - 未配置可信代理：来自私有地址或 localhost 的连接视为代理
//! - 其余情况使用连接 IP，防止伪造

use std::net::{IpAddr, SocketAddr};

use actix_web::HttpRequest;
use actix_web::http::header::HeaderMap;
use tracing::{trace, warn};

/// 检查 IP 是否为私有地址或 localhost
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // fc00::/7
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // fe80::/10
        }
    }
}

/// 单个可信代理网段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProxyNet {
    addr: IpAddr,
    prefix_len: u8,
}

impl ProxyNet {
    fn parse(entry: &str) -> Option<Self> {
        let (addr, prefix_len) = match entry.split_once('/') {
            Some((addr, len)) => (addr.parse::<IpAddr>().ok()?, len.parse::<u8>().ok()?),
            None => {
                let addr = entry.parse::<IpAddr>().ok()?;
                let full = if addr.is_ipv4() { 32 } else { 128 };
                (addr, full)
            }
        };
        let max = if addr.is_ipv4() { 32 } else { 128 };
        (prefix_len <= max).then_some(Self { addr, prefix_len })
    }

    fn contains(&self, ip: &IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - self.prefix_len as u32).unwrap_or(0);
                u32::from(net) & mask == u32::from(*ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - self.prefix_len as u32).unwrap_or(0);
                u128::from(net) & mask == u128::from(*ip) & mask
            }
            _ => false,
        }
    }
}

/// 可信代理列表（启动时解析一次）
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    nets: Vec<ProxyNet>,
}

impl TrustedProxies {
    /// 解析 IP / CIDR 列表，非法条目记录警告后跳过
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Self {
        let nets = entries
            .iter()
            .filter_map(|entry| {
                let entry = entry.as_ref().trim();
                let net = ProxyNet::parse(entry);
                if net.is_none() {
                    warn!("Ignoring invalid trusted proxy entry: '{}'", entry);
                }
                net
            })
            .collect();
        Self { nets }
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.nets.iter().any(|net| net.contains(ip))
    }

    /// 该连接的转发头是否可信
    fn trusts(&self, peer: &IpAddr) -> bool {
        if self.is_empty() {
            is_private_or_local(peer)
        } else {
            self.contains(peer)
        }
    }
}

/// 把 `ip`、`ip:port`、`[v6]:port` 统一成纯 IP 字符串
fn normalize_ip(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        addr.ip().to_string()
    } else if let Ok(ip) = raw.parse::<IpAddr>() {
        ip.to_string()
    } else {
        raw.to_string()
    }
}

/// 解析 RFC 7239 `Forwarded` 头第一跳的 `for=` 节点
///
/// 支持 `for=1.2.3.4`、`for="1.2.3.4:80"`、`for="[2001:db8::1]:4711"`；
/// `unknown` 和 `_hidden` 这类混淆标识不是 IP，直接忽略。
fn forwarded_for(value: &str) -> Option<String> {
    let first_hop = value.split(',').next()?;
    let node = first_hop.split(';').find_map(|pair| {
        let (key, val) = pair.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("for")
            .then(|| val.trim().trim_matches('"'))
    })?;

    let ip = match node.strip_prefix('[') {
        Some(rest) => rest.split(']').next()?.parse::<IpAddr>().ok()?,
        None => normalize_ip(node).parse::<IpAddr>().ok()?,
    };
    Some(ip.to_string())
}

/// 从请求头提取转发的 IP
///
/// 顺序：X-Forwarded-For 第一个，其次 Forwarded 的 `for=`，最后 X-Real-IP。
pub fn forwarded_ip_from_headers(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| headers.get(name).and_then(|h| h.to_str().ok());

    header("x-forwarded-for")
        .and_then(|s| s.split(',').map(str::trim).find(|s| !s.is_empty()))
        .map(normalize_ip)
        .or_else(|| header("forwarded").and_then(forwarded_for))
        .or_else(|| {
            header("x-real-ip")
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(normalize_ip)
        })
}

/// 从 HttpRequest 提取客户端 IP
pub fn extract_client_ip(req: &HttpRequest, trusted: &TrustedProxies) -> Option<String> {
    let peer = req.peer_addr().map(|addr| addr.ip());

    if let Some(peer) = peer
        && trusted.trusts(&peer)
        && let Some(real_ip) = forwarded_ip_from_headers(req.headers())
    {
        trace!("Forwarded client ip via proxy {}: {}", peer, real_ip);
        return Some(real_ip);
    }

    peer.map(|ip| ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_is_private_or_local() {
        assert!(is_private_or_local(&"10.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"192.168.1.1".parse().unwrap()));
        assert!(is_private_or_local(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"::1".parse().unwrap()));
        assert!(is_private_or_local(&"fd00::1".parse().unwrap()));
        assert!(is_private_or_local(&"fe80::1".parse().unwrap()));
        assert!(!is_private_or_local(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_or_local(&"2001:4860::8888".parse().unwrap()));
    }

    #[test]
    fn test_trusted_proxies_cidr_and_single() {
        let trusted = TrustedProxies::parse(&["10.1.0.0/16", "203.0.113.7", "2001:db8::/32"]);
        assert!(trusted.contains(&"10.1.200.3".parse().unwrap()));
        assert!(!trusted.contains(&"10.2.0.1".parse().unwrap()));
        assert!(trusted.contains(&"203.0.113.7".parse().unwrap()));
        assert!(!trusted.contains(&"203.0.113.8".parse().unwrap()));
        assert!(trusted.contains(&"2001:db8::1".parse().unwrap()));
        // IPv4 映射地址不匹配 IPv4 网段
        assert!(!trusted.contains(&"::ffff:10.1.0.1".parse().unwrap()));
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        let trusted = TrustedProxies::parse(&["nope", "10.0.0.0/33", "0.0.0.0/0"]);
        assert!(!trusted.is_empty());
        // 0.0.0.0/0 匹配所有 IPv4
        assert!(trusted.contains(&"8.8.8.8".parse().unwrap()));
        assert!(!trusted.contains(&"::1".parse().unwrap()));
    }

    #[test]
    fn test_forwarded_header_priority() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", " 9.9.9.9, 10.0.0.1"))
            .insert_header(("X-Real-IP", "8.8.8.8"))
            .to_http_request();
        assert_eq!(forwarded_ip_from_headers(req.headers()), Some("9.9.9.9".to_string()));

        let req = TestRequest::default()
            .insert_header(("X-Real-IP", "8.8.8.8:443"))
            .to_http_request();
        assert_eq!(forwarded_ip_from_headers(req.headers()), Some("8.8.8.8".to_string()));
    }

    #[test]
    fn test_forwarded_header() {
        let ip = |value: &str| {
            let req = TestRequest::default()
                .insert_header(("Forwarded", value))
                .to_http_request();
            forwarded_ip_from_headers(req.headers())
        };

        assert_eq!(ip("for=9.9.9.9"), Some("9.9.9.9".to_string()));
        assert_eq!(
            ip("proto=https;For=\"9.9.9.9:443\";by=10.0.0.1, for=10.0.0.2"),
            Some("9.9.9.9".to_string())
        );
        assert_eq!(
            ip("for=\"[2001:db8:cafe::17]:4711\""),
            Some("2001:db8:cafe::17".to_string())
        );
        assert_eq!(ip("for=\"[2001:db8::1]\""), Some("2001:db8::1".to_string()));
        assert_eq!(ip("for=unknown"), None);
        assert_eq!(ip("for=_hidden;proto=http"), None);
        assert_eq!(ip("proto=http"), None);
    }

    #[test]
    fn test_forwarded_header_between_xff_and_real_ip() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "1.1.1.1"))
            .insert_header(("Forwarded", "for=2.2.2.2"))
            .insert_header(("X-Real-IP", "3.3.3.3"))
            .to_http_request();
        assert_eq!(forwarded_ip_from_headers(req.headers()), Some("1.1.1.1".to_string()));

        let req = TestRequest::default()
            .insert_header(("Forwarded", "for=2.2.2.2"))
            .insert_header(("X-Real-IP", "3.3.3.3"))
            .to_http_request();
        assert_eq!(forwarded_ip_from_headers(req.headers()), Some("2.2.2.2".to_string()));

        // Forwarded 里没有可用的 IP 时退回 X-Real-IP
        let req = TestRequest::default()
            .insert_header(("Forwarded", "for=unknown"))
            .insert_header(("X-Real-IP", "3.3.3.3"))
            .to_http_request();
        assert_eq!(forwarded_ip_from_headers(req.headers()), Some("3.3.3.3".to_string()));
    }

    #[test]
    fn test_extract_client_ip_auto_detect() {
        let trusted = TrustedProxies::default();

        // 私有地址连接：信任转发头
        let req = TestRequest::default()
            .peer_addr("127.0.0.1:5000".parse().unwrap())
            .insert_header(("X-Forwarded-For", "9.9.9.9"))
            .to_http_request();
        assert_eq!(extract_client_ip(&req, &trusted), Some("9.9.9.9".to_string()));

        // 公网直连：忽略转发头
        let req = TestRequest::default()
            .peer_addr("1.2.3.4:5000".parse().unwrap())
            .insert_header(("X-Forwarded-For", "9.9.9.9"))
            .to_http_request();
        assert_eq!(extract_client_ip(&req, &trusted), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn test_extract_client_ip_explicit_proxies() {
        let trusted = TrustedProxies::parse(&["1.2.3.4"]);

        let req = TestRequest::default()
            .peer_addr("1.2.3.4:5000".parse().unwrap())
            .insert_header(("X-Forwarded-For", "9.9.9.9"))
            .to_http_request();
        assert_eq!(extract_client_ip(&req, &trusted), Some("9.9.9.9".to_string()));

        // 显式配置后，私有地址不再自动信任
        let req = TestRequest::default()
            .peer_addr("127.0.0.1:5000".parse().unwrap())
            .insert_header(("X-Forwarded-For", "9.9.9.9"))
            .to_http_request();
        assert_eq!(extract_client_ip(&req, &trusted), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn test_extract_client_ip_without_peer() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(extract_client_ip(&req, &TrustedProxies::default()), None);
    }
}
