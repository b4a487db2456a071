//! 配置管理系统 (Configuration Management)
//!
//! 三层配置：
//! - `Settings`：命令行前端读取的 `spider.toml` / `SPIDER_*` 环境变量；
//! - `TransportConfig`：显式传递给传输工厂的构造参数；
//! - `GlobalDefaults`：进程级默认值快照，只在构造新传输时读取。

use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use bon::Builder;
use config::{Config, Environment, File};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::core::error::{Result, SpiderError};
use crate::network::headers::{DEFAULT_USER_AGENT, default_header_set};

/// 命令行前端配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct Settings {
    /// 代理地址，形如 `socks5://127.0.0.1:1080`
    pub proxy: Option<String>,

    /// 请求总超时 (秒)，0 表示不限制
    #[serde(default)]
    #[builder(default)]
    pub timeout_secs: u64,

    /// 覆盖默认 User-Agent
    pub user_agent: Option<String>,

    /// 每个周期发送前的等待时间 (毫秒)
    #[serde(default)]
    #[builder(default)]
    pub wait_ms: u64,

    /// 是否启用 Cookie Jar
    #[serde(default = "default_cookies")]
    #[builder(default = default_cookies())]
    pub cookies: bool,
}

fn default_cookies() -> bool {
    true
}

impl Settings {
    /// 从配置文件与环境变量加载
    ///
    /// 文件不存在时只使用环境变量；环境变量优先。
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let builder = Config::builder();

        let builder = if path.exists() {
            builder.add_source(File::from(path))
        } else {
            builder
        };

        let settings = builder
            .add_source(Environment::with_prefix("SPIDER"))
            .build()
            .map_err(SpiderError::Settings)?;
        settings.try_deserialize().map_err(SpiderError::Settings)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    /// 以进程级默认值为基础，叠加本配置的覆盖项
    pub fn transport_config(&self) -> Result<TransportConfig> {
        let mut config = TransportConfig::from_global();
        if self.timeout_secs > 0 {
            config.timeout = Some(Duration::from_secs(self.timeout_secs));
        }
        if let Some(ua) = &self.user_agent {
            let value = HeaderValue::from_str(ua)
                .map_err(|e| SpiderError::InvalidHeader(format!("user_agent: {}", e)))?;
            config.default_headers.insert(USER_AGENT, value);
        }
        Ok(config)
    }
}

/// 传输构造参数
///
/// 在传输构造时被一次性读取，之后修改不影响已构造的传输。
#[derive(Debug, Clone, Builder)]
pub struct TransportConfig {
    /// 请求总超时，`None` 表示不限制
    pub timeout: Option<Duration>,
    /// 默认请求头集合，必定包含 User-Agent
    #[builder(default = default_header_set())]
    pub default_headers: HeaderMap,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            default_headers: default_header_set(),
        }
    }
}

impl TransportConfig {
    /// 基于当前进程级默认值快照
    pub fn from_global() -> Self {
        let defaults = global_defaults();
        Self {
            timeout: defaults.timeout,
            default_headers: defaults.headers.clone(),
        }
    }
}

/// 进程级默认值 (不可变快照)
#[derive(Debug, Clone)]
pub struct GlobalDefaults {
    pub timeout: Option<Duration>,
    pub headers: HeaderMap,
}

impl Default for GlobalDefaults {
    fn default() -> Self {
        Self {
            timeout: None,
            headers: default_header_set(),
        }
    }
}

static GLOBAL_DEFAULTS: LazyLock<RwLock<Arc<GlobalDefaults>>> =
    LazyLock::new(|| RwLock::new(Arc::new(GlobalDefaults::default())));

/// 读取当前进程级默认值
pub fn global_defaults() -> Arc<GlobalDefaults> {
    GLOBAL_DEFAULTS.read().clone()
}

/// 设置全局超时，作用于之后构造的所有传输；`Duration::ZERO` 表示不限制
pub fn set_global_timeout(timeout: Duration) {
    let mut guard = GLOBAL_DEFAULTS.write();
    let mut next = GlobalDefaults::clone(&guard);
    next.timeout = (!timeout.is_zero()).then_some(timeout);
    *guard = Arc::new(next);
}

/// 替换全局默认请求头；缺少 User-Agent 时自动补齐
pub fn set_default_headers(headers: HeaderMap) {
    let headers = ensure_user_agent(headers);
    let mut guard = GLOBAL_DEFAULTS.write();
    let mut next = GlobalDefaults::clone(&guard);
    next.headers = headers;
    *guard = Arc::new(next);
}

fn ensure_user_agent(mut headers: HeaderMap) -> HeaderMap {
    if !headers.contains_key(USER_AGENT) {
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    }
    headers
}
