//! 客户端 IP 提取
//!
//! 追踪命中记录来源 IP。部署形态假定服务在反向代理后面：
//! 连接来自私有地址时信任 X-Forwarded-For / X-Real-IP，
//! 公网直连时只用连接 IP，防止伪造。

use std::net::IpAddr;

use actix_web::HttpRequest;
use tracing::debug;

/// 检查 IP 是否为私有地址或 localhost
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => {
            // fc00::/7 (ULA)、fe80::/10 (link-local)、::1
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// 提取真实客户端 IP
///
/// 连接来自私有 IP 且带转发头时使用转发头，否则使用连接 IP。
pub fn extract_client_ip(req: &HttpRequest) -> Option<String> {
    let conn_info = req.connection_info();
    let peer_ip = conn_info.peer_addr()?;

    if let Ok(ip_addr) = peer_ip.parse::<IpAddr>()
        && is_private_or_local(&ip_addr)
        && let Some(forwarded) = extract_forwarded_ip(req)
    {
        debug!("连接来自私有地址 {}，采用转发头 IP {}", peer_ip, forwarded);
        return Some(forwarded);
    }

    Some(peer_ip.to_string())
}

/// 从请求头提取转发的 IP（X-Forwarded-For 优先，取第一跳）
fn extract_forwarded_ip(req: &HttpRequest) -> Option<String> {
    let headers = req.headers();
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(String::from)
        })
}
