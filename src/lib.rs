//! 有状态 HTTP 请求代理 (Stateful HTTP Request Agent)
//!
//! `Spider` 累积请求配置，经直连或代理传输发送，并记录最近一次响应。
//!
//! ```no_run
//! # async fn demo() -> spider_agent::Result<()> {
//! use spider_agent::Spider;
//!
//! let spider = Spider::new(Some("socks5://127.0.0.1:1080"))?;
//! spider.set_url("https://httpbin.org/post").set_form_param("q", "rust");
//! let body = spider.post().await?;
//! println!("{} {}", spider.status().map_or(0, |s| s.as_u16()), body.len());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod core;
pub mod interfaces;
pub mod network;

pub use crate::agent::Spider;
pub use crate::agent::state::{FormData, PendingRequest, Record, RequestSnapshot, ResponseSnapshot};
pub use crate::agent::verb::{BodySource, Dispatch, Verb};
pub use crate::core::config::{
    GlobalDefaults, Settings, TransportConfig, global_defaults, set_default_headers,
    set_global_timeout,
};
pub use crate::core::error::{Result, SpiderError};
pub use crate::interfaces::{AfterHook, BeforeHook};
pub use crate::network::{ProxyScheme, ProxySpec, Route, Transport};
