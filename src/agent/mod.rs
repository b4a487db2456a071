//! 有状态请求代理 (Spider)
//!
//! 累积待发送请求 (URL、动词、请求头、表单或二进制请求体)，通过持有的传输发送，
//! 并把最近一次响应保存下来供调用方查看。

pub mod pipeline;
pub mod state;
pub mod verb;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::Extensions;
use parking_lot::RwLock;
use reqwest::header::{HOST, HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use url::Url;

use crate::core::config::TransportConfig;
use crate::core::error::{Result, SpiderError};
use crate::interfaces::{AfterHook, BeforeHook};
use crate::network::Transport;

use self::state::{FormData, PendingRequest, Record};
use self::verb::{BodySource, Verb};

/// 有状态请求代理
///
/// 可通过 `Arc` 在多个任务间共享；同一 Spider 同时最多只有一个周期在执行，
/// 并发调用会排队等待。周期之外对待发送字段的修改不受该锁保护。
pub struct Spider {
    transport: Transport,
    proxy_address: String,
    pending: RwLock<PendingRequest>,
    record: RwLock<Record>,
    wait: RwLock<Duration>,
    before: RwLock<Option<Arc<dyn BeforeHook>>>,
    after: RwLock<Option<Arc<dyn AfterHook>>>,
    context: RwLock<Extensions>,
    fetch_count: AtomicU64,
    error_count: AtomicU64,
    cycle: tokio::sync::Mutex<()>,
}

impl Spider {
    /// 构造 Spider：`None` 直连，否则按代理地址构造
    ///
    /// 代理地址形如 `http://[user:password@]host:port` 或 `socks5://127.0.0.1:1080`。
    pub fn new(proxy: Option<&str>) -> Result<Self> {
        Self::with_config(proxy, &TransportConfig::from_global())
    }

    /// 使用显式传输配置构造
    pub fn with_config(proxy: Option<&str>, config: &TransportConfig) -> Result<Self> {
        Ok(Self::with_transport(Transport::from_spec(proxy, config)?))
    }

    /// 不保留 Cookie 的 API 型 Spider
    pub fn api() -> Result<Self> {
        let transport = Transport::without_cookies(&TransportConfig::from_global())?;
        Ok(Self::with_transport(transport))
    }

    /// 使用调用方提供的传输
    pub fn with_transport(transport: Transport) -> Self {
        Self {
            proxy_address: transport.route().to_string(),
            transport,
            pending: RwLock::new(PendingRequest::default()),
            record: RwLock::new(Record::default()),
            wait: RwLock::new(Duration::ZERO),
            before: RwLock::new(None),
            after: RwLock::new(None),
            context: RwLock::new(Extensions::new()),
            fetch_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            cycle: tokio::sync::Mutex::new(()),
        }
    }

    // =========================================================================
    // 待发送请求
    // =========================================================================

    pub fn set_url(&self, url: impl Into<String>) -> &Self {
        self.pending.write().url = url.into();
        self
    }

    pub fn set_method(&self, method: Verb) -> &Self {
        self.pending.write().method = method;
        self
    }

    /// 每个周期发送前的固定等待
    pub fn set_wait(&self, wait: Duration) -> &Self {
        *self.wait.write() = wait;
        self
    }

    /// 设置请求头 (覆盖同名的已有值)
    pub fn set_header(&self, name: &str, value: &str) -> Result<&Self> {
        let (name, value) = parse_header(name, value)?;
        self.pending.write().headers.insert(name, value);
        Ok(self)
    }

    /// 追加请求头 (保留同名的已有值)
    pub fn add_header(&self, name: &str, value: &str) -> Result<&Self> {
        let (name, value) = parse_header(name, value)?;
        self.pending.write().headers.append(name, value);
        Ok(self)
    }

    pub fn set_user_agent(&self, ua: &str) -> Result<&Self> {
        self.set_header(USER_AGENT.as_str(), ua)
    }

    pub fn set_referer(&self, referer: &str) -> Result<&Self> {
        self.set_header(REFERER.as_str(), referer)
    }

    pub fn set_host(&self, host: &str) -> Result<&Self> {
        self.set_header(HOST.as_str(), host)
    }

    pub fn set_headers(&self, headers: HeaderMap) -> &Self {
        self.pending.write().headers = headers;
        self
    }

    pub fn clear_headers(&self) -> &Self {
        self.pending.write().headers.clear();
        self
    }

    /// 设置表单字段 (覆盖同名字段)
    pub fn set_form_param(&self, key: impl Into<String>, value: impl Into<String>) -> &Self {
        self.pending.write().form.insert(key.into(), vec![value.into()]);
        self
    }

    /// 追加表单字段值
    pub fn add_form_param(&self, key: impl Into<String>, value: impl Into<String>) -> &Self {
        self.pending
            .write()
            .form
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn set_form(&self, form: FormData) -> &Self {
        self.pending.write().form = form;
        self
    }

    /// 设置二进制请求体 (JSON、XML、文件)
    pub fn set_binary(&self, data: impl Into<Bytes>) -> &Self {
        self.pending.write().binary = data.into();
        self
    }

    /// 序列化为 JSON 作为二进制请求体
    pub fn set_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<&Self> {
        let data = serde_json::to_vec(value)?;
        Ok(self.set_binary(data))
    }

    /// 整体替换待发送请求
    pub fn set_pending(&self, pending: PendingRequest) -> &Self {
        *self.pending.write() = pending;
        self
    }

    /// 清空请求体 (表单与二进制)
    pub fn clear(&self) -> &Self {
        self.pending.write().clear_body();
        self
    }

    /// 清空请求体与请求头
    pub fn clear_all(&self) -> &Self {
        let mut pending = self.pending.write();
        pending.clear_body();
        pending.headers.clear();
        self
    }

    // =========================================================================
    // 钩子与上下文
    // =========================================================================

    pub fn set_before_hook(&self, hook: impl BeforeHook + 'static) -> &Self {
        *self.before.write() = Some(Arc::new(hook));
        self
    }

    pub fn set_after_hook(&self, hook: impl AfterHook + 'static) -> &Self {
        *self.after.write() = Some(Arc::new(hook));
        self
    }

    pub fn clear_hooks(&self) -> &Self {
        *self.before.write() = None;
        *self.after.write() = None;
        self
    }

    /// 写入钩子上下文，按类型区分
    pub fn insert_context<T: Clone + Send + Sync + 'static>(&self, value: T) -> &Self {
        self.context.write().insert(value);
        self
    }

    pub fn context<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.context.read().get::<T>().cloned()
    }

    // =========================================================================
    // 动词
    // =========================================================================

    pub async fn get(&self) -> Result<Bytes> {
        self.dispatch(Verb::Get).await
    }

    pub async fn delete(&self) -> Result<Bytes> {
        self.dispatch(Verb::Delete).await
    }

    pub async fn post(&self) -> Result<Bytes> {
        self.dispatch(Verb::Post).await
    }

    pub async fn post_json(&self) -> Result<Bytes> {
        self.dispatch(Verb::PostJson).await
    }

    pub async fn post_xml(&self) -> Result<Bytes> {
        self.dispatch(Verb::PostXml).await
    }

    pub async fn post_file(&self) -> Result<Bytes> {
        self.dispatch(Verb::PostFile).await
    }

    pub async fn put(&self) -> Result<Bytes> {
        self.dispatch(Verb::Put).await
    }

    pub async fn put_json(&self) -> Result<Bytes> {
        self.dispatch(Verb::PutJson).await
    }

    pub async fn put_xml(&self) -> Result<Bytes> {
        self.dispatch(Verb::PutXml).await
    }

    pub async fn put_file(&self) -> Result<Bytes> {
        self.dispatch(Verb::PutFile).await
    }

    /// 任意方法与 Content-Type，请求体优先使用 binary
    ///
    /// `content_type` 为空串时不设置 Content-Type。
    pub async fn send_with(&self, method: &str, content_type: &str) -> Result<Bytes> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| SpiderError::InvalidMethod(method.to_string()))?;
        self.execute(method, Some(content_type), true).await
    }

    /// 按已保存的动词分派
    pub async fn go_auto(&self) -> Result<Bytes> {
        let verb = self.pending.read().method;
        self.dispatch(verb).await
    }

    /// 保存动词后分派
    pub async fn go_by_method(&self, verb: &str) -> Result<Bytes> {
        self.set_method(Verb::parse(verb)?);
        self.go_auto().await
    }

    async fn dispatch(&self, verb: Verb) -> Result<Bytes> {
        let dispatch = verb::resolve(verb)?;
        let use_binary = dispatch.use_binary();
        if dispatch.body == BodySource::None {
            self.clear();
        }
        self.execute(dispatch.method, dispatch.content_type, use_binary)
            .await
    }

    // =========================================================================
    // 状态读取
    // =========================================================================

    pub fn url(&self) -> String {
        self.pending.read().url.clone()
    }

    pub fn method(&self) -> Verb {
        self.pending.read().method
    }

    pub fn wait(&self) -> Duration {
        *self.wait.read()
    }

    /// 待发送请求的副本
    pub fn pending(&self) -> PendingRequest {
        self.pending.read().clone()
    }

    /// 最近一个成功周期的结果副本
    pub fn record(&self) -> Record {
        self.record.read().clone()
    }

    pub fn body(&self) -> Bytes {
        self.record.read().body.clone()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.record.read().status
    }

    pub fn previous_url(&self) -> Option<String> {
        self.record.read().previous_url.clone()
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::SeqCst)
    }

    /// 传输路径的诊断描述 (凭据已隐藏)
    pub fn proxy_address(&self) -> &str {
        &self.proxy_address
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn text(&self) -> String {
        self.record.read().text()
    }

    pub fn json_pretty(&self) -> Result<String> {
        self.record.read().json_pretty()
    }

    /// 当前 URL 在 Cookie Jar 中的 Cookie 头
    pub fn cookies(&self) -> Option<HeaderValue> {
        let url = Url::parse(&self.url()).ok()?;
        self.transport.cookies(&url)
    }

    /// 为当前 URL 写入一条 Cookie；无 Jar 时返回 false
    pub fn add_cookie(&self, raw: &str) -> Result<bool> {
        let url = self.url();
        let url = Url::parse(&url).map_err(|source| SpiderError::InvalidUrl { url, source })?;
        Ok(self.transport.add_cookie(raw, &url))
    }
}

impl std::fmt::Debug for Spider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spider")
            .field("proxy_address", &self.proxy_address)
            .field("url", &self.url())
            .field("method", &self.method())
            .field("fetch_count", &self.fetch_count())
            .field("error_count", &self.error_count())
            .finish_non_exhaustive()
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| SpiderError::InvalidHeader(format!("{}: {}", name, e)))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| SpiderError::InvalidHeader(format!("{}: {}", name, e)))?;
    Ok((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Route;

    #[test]
    fn test_construction_routes() {
        let direct = Spider::new(None).unwrap();
        assert_eq!(direct.proxy_address(), "direct");
        assert!(direct.transport().has_cookie_jar());

        let proxied = Spider::new(Some("socks5://127.0.0.1:1080")).unwrap();
        assert_eq!(proxied.transport().route(), &Route::Proxy("socks5://127.0.0.1:1080".into()));

        let api = Spider::api().unwrap();
        assert!(!api.transport().has_cookie_jar());

        assert!(matches!(Spider::new(Some("ftp://x")), Err(SpiderError::InvalidProxy { .. })));
    }

    #[test]
    fn test_setters() {
        let spider = Spider::new(None).unwrap();
        spider
            .set_url("http://example.com/a")
            .set_method(Verb::PostJson)
            .set_form_param("k", "v")
            .add_form_param("k", "w")
            .set_binary(&b"raw"[..]);
        spider.set_referer("http://example.com/").unwrap();
        spider.add_header("accept", "text/html").unwrap();
        spider.add_header("accept", "text/plain").unwrap();

        let pending = spider.pending();
        assert_eq!(pending.url, "http://example.com/a");
        assert_eq!(pending.method, Verb::PostJson);
        assert_eq!(pending.form["k"], vec!["v".to_string(), "w".to_string()]);
        assert_eq!(pending.binary, "raw");
        assert_eq!(pending.headers.get_all("accept").iter().count(), 2);
        assert_eq!(pending.headers.get(REFERER).unwrap(), "http://example.com/");

        spider.clear();
        let pending = spider.pending();
        assert!(pending.form.is_empty());
        assert!(pending.binary.is_empty());
        assert!(!pending.headers.is_empty());

        spider.clear_all();
        assert!(spider.pending().headers.is_empty());
    }

    #[test]
    fn test_invalid_header_rejected() {
        let spider = Spider::new(None).unwrap();
        assert!(matches!(spider.set_header("bad header", "v"), Err(SpiderError::InvalidHeader(_))));
        assert!(matches!(spider.set_header("x-ok", "line\nbreak"), Err(SpiderError::InvalidHeader(_))));
    }

    #[test]
    fn test_context_and_cookies() {
        #[derive(Clone, Debug, PartialEq)]
        struct Tenant(&'static str);

        let spider = Spider::new(None).unwrap();
        spider.insert_context(Tenant("acme"));
        assert_eq!(spider.context::<Tenant>(), Some(Tenant("acme")));
        assert_eq!(spider.context::<u32>(), None);

        spider.set_url("http://example.com/");
        assert!(spider.add_cookie("sid=1").unwrap());
        assert_eq!(spider.cookies().unwrap(), "sid=1");

        let api = Spider::api().unwrap();
        api.set_url("http://example.com/");
        assert!(!api.add_cookie("sid=1").unwrap());
    }

    #[test]
    fn test_set_json() {
        let spider = Spider::new(None).unwrap();
        spider.set_json(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(spider.pending().binary, "{\"a\":1}");
    }
}
