//! 请求头协调 (Header Reconciliation)

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

/// 默认 User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("spider-agent/", env!("CARGO_PKG_VERSION"));

/// 默认请求头集合，只包含 User-Agent
pub fn default_header_set() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers
}

/// 合并调用方请求头与默认请求头
///
/// - 调用方请求头为空时直接返回默认集合；
/// - 否则返回调用方请求头的副本，缺少 User-Agent 时从默认集合补齐。
///
/// 永远不修改 `caller`。
pub fn merge(caller: &HeaderMap, defaults: &HeaderMap) -> HeaderMap {
    if caller.is_empty() {
        return defaults.clone();
    }

    let mut merged = caller.clone();
    if !merged.contains_key(USER_AGENT) {
        let ua = defaults
            .get(USER_AGENT)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_USER_AGENT));
        merged.insert(USER_AGENT, ua);
    }
    merged
}
