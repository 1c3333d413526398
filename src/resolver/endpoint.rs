//! Endpoint URI 解析
//!
//! 实例 endpoint 的格式为 `scheme://host:port?isSecure=true|false`，
//! 识别 http、https、grpc、grpcs 四种 scheme；
//! 旧格式用 isSecure 查询参数表达安全标志，基础 scheme 加 s 等价

use url::Url;

use crate::error::{Result, SelectorError};

/// 按安全标志拼出目标 scheme
pub fn scheme(scheme: &str, is_secure: bool) -> String {
    if is_secure {
        format!("{}s", scheme)
    } else {
        scheme.to_string()
    }
}

/// 从实例的 endpoint 列表中找出匹配目标 scheme 的地址
///
/// 没有匹配项时返回 None，由调用方决定是否丢弃该实例
pub fn parse_endpoint(endpoints: &[String], target_scheme: &str) -> Result<Option<String>> {
    for raw in endpoints {
        let url = Url::parse(raw)
            .map_err(|e| SelectorError::invalid_endpoint(format!("{}: {}", raw, e)))?;
        if url.scheme() == target_scheme || legacy_matches(&url, target_scheme) {
            let host = match url.host_str() {
                Some(h) => h,
                None => continue,
            };
            let address = match url.port_or_known_default() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            return Ok(Some(address));
        }
    }
    Ok(None)
}

// 旧格式：isSecure=true 时基础 scheme 等价于带 s 的安全 scheme
fn legacy_matches(url: &Url, target_scheme: &str) -> bool {
    let is_secure = url
        .query_pairs()
        .any(|(k, v)| k == "isSecure" && v.eq_ignore_ascii_case("true"));
    is_secure && format!("{}s", url.scheme()) == target_scheme
}
