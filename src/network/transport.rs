//! 传输工厂 (Transport Factory)
//!
//! 由一条连接字符串构造直连或代理传输。构造过程不产生任何网络 I/O。

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use strum_macros::{Display, EnumString};
use tracing::debug;
use url::Url;

use crate::core::config::TransportConfig;
use crate::core::error::{Result, SpiderError};
use crate::network::middleware::TraceMiddleware;

/// 支持的代理协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProxyScheme {
    Http,
    Https,
    Socks5,
}

/// 已校验的代理地址 `scheme://[user:pass@]host[:port]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySpec {
    url: Url,
    scheme: ProxyScheme,
}

impl ProxySpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = |reason: String| SpiderError::InvalidProxy {
            spec: spec.to_string(),
            reason,
        };

        let url = Url::parse(spec.trim()).map_err(|e| invalid(e.to_string()))?;
        let scheme = ProxyScheme::from_str(url.scheme())
            .map_err(|_| invalid(format!("unsupported scheme `{}`", url.scheme())))?;

        if url.host_str().is_none_or(str::is_empty) {
            return Err(invalid("missing host".to_string()));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("unexpected query or fragment".to_string()));
        }

        Ok(Self { url, scheme })
    }

    pub fn scheme(&self) -> ProxyScheme {
        self.scheme
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn has_credentials(&self) -> bool {
        !self.url.username().is_empty() || self.url.password().is_some()
    }
}

impl FromStr for ProxySpec {
    type Err = SpiderError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// 输出时隐藏凭据
impl fmt::Display for ProxySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host = self.url.host_str().unwrap_or_default();
        let auth = if self.has_credentials() { "***@" } else { "" };
        match self.url.port() {
            Some(port) => write!(f, "{}://{}{}:{}", self.scheme, auth, host, port),
            None => write!(f, "{}://{}{}", self.scheme, auth, host),
        }
    }
}

/// 传输的连接路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Direct,
    /// 经代理转发 (凭据已隐藏)
    Proxy(String),
    /// 调用方自带的客户端
    Custom,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Direct => write!(f, "direct"),
            Route::Proxy(addr) => write!(f, "{}", addr),
            Route::Custom => write!(f, "custom"),
        }
    }
}

/// 底层 HTTP 传输
///
/// 持有带中间件的客户端、可选的 Cookie Jar，以及构造时捕获的默认请求头。
#[derive(Clone)]
pub struct Transport {
    client: ClientWithMiddleware,
    jar: Option<Arc<Jar>>,
    route: Route,
    default_headers: Arc<HeaderMap>,
}

impl Transport {
    /// 按连接字符串构造：`None` 为直连，否则经代理
    pub fn from_spec(spec: Option<&str>, config: &TransportConfig) -> Result<Self> {
        match spec {
            Some(spec) => Self::proxied(&ProxySpec::parse(spec)?, config),
            None => Self::direct(config),
        }
    }

    /// 直连，启用 Cookie Jar
    pub fn direct(config: &TransportConfig) -> Result<Self> {
        Self::build(None, true, config)
    }

    /// 经代理转发全部连接，启用 Cookie Jar
    pub fn proxied(spec: &ProxySpec, config: &TransportConfig) -> Result<Self> {
        Self::build(Some(spec), true, config)
    }

    /// 直连，不保留 Cookie (用于 API 类请求)
    pub fn without_cookies(config: &TransportConfig) -> Result<Self> {
        Self::build(None, false, config)
    }

    /// 包装调用方自带的客户端
    ///
    /// 默认请求头取自当前进程级默认值。
    pub fn from_client(client: reqwest::Client) -> Self {
        let config = TransportConfig::from_global();
        Self {
            client: Self::wrap(client),
            jar: None,
            route: Route::Custom,
            default_headers: Arc::new(config.default_headers),
        }
    }

    /// 通用构造：可选代理 + 可选 Cookie Jar
    pub fn build(proxy: Option<&ProxySpec>, cookies: bool, config: &TransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();

        let route = match proxy {
            Some(spec) => {
                let proxy = reqwest::Proxy::all(spec.url().as_str()).map_err(|e| {
                    SpiderError::InvalidProxy {
                        spec: spec.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                builder = builder.proxy(proxy);
                Route::Proxy(spec.to_string())
            }
            None => {
                builder = builder.no_proxy();
                Route::Direct
            }
        };

        let jar = cookies.then(|| Arc::new(Jar::default()));
        if let Some(jar) = &jar {
            builder = builder.cookie_provider(jar.clone());
        }

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(SpiderError::Build)?;
        debug!("传输已构造: route={}, cookies={}, timeout={:?}", route, cookies, config.timeout);

        Ok(Self {
            client: Self::wrap(client),
            jar,
            route,
            default_headers: Arc::new(config.default_headers.clone()),
        })
    }

    fn wrap(client: reqwest::Client) -> ClientWithMiddleware {
        ClientBuilder::new(client).with(TraceMiddleware).build()
    }

    pub fn client(&self) -> &ClientWithMiddleware {
        &self.client
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    pub fn has_cookie_jar(&self) -> bool {
        self.jar.is_some()
    }

    /// 读取 Jar 中对应 URL 的 Cookie 头
    pub fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar.as_ref().and_then(|jar| jar.cookies(url))
    }

    /// 向 Jar 写入一条 `Set-Cookie` 格式的 Cookie；无 Jar 时返回 false
    pub fn add_cookie(&self, raw: &str, url: &Url) -> bool {
        match &self.jar {
            Some(jar) => {
                jar.add_cookie_str(raw, url);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("route", &self.route)
            .field("cookies", &self.jar.is_some())
            .finish_non_exhaustive()
    }
}
