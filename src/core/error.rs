//! 错误处理体系 (Error Handling System)
//!
//! 定义代理构造、方法分派与请求周期中的错误类型及全局 Result 别名。

use thiserror::Error;

/// 全局错误定义 (Spider Domain Errors)
#[derive(Error, Debug)]
pub enum SpiderError {
    /// 代理地址无法解析或协议不受支持 (构造期致命错误)
    #[error("Configuration error: invalid proxy spec `{spec}`: {reason}")]
    InvalidProxy { spec: String, reason: String },

    /// 底层客户端构建失败
    #[error("Client build error: {0}")]
    Build(#[source] reqwest::Error),

    /// 传输层失败 (连接、DNS、TLS、超时)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    /// 读取响应体时连接中断
    #[error("Body read error: {0}")]
    Body(#[source] reqwest::Error),

    #[error("Unsupported method `{0}`: use send_with(method, content_type) instead")]
    UnsupportedMethod(String),

    #[error("Unknown verb `{0}`")]
    UnknownVerb(String),

    #[error("Invalid HTTP method token `{0}`")]
    InvalidMethod(String),

    #[error("Invalid URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Form encoding error: {0}")]
    FormEncoding(#[from] serde_urlencoded::ser::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 全局 Result 别名
pub type Result<T> = std::result::Result<T, SpiderError>;

impl SpiderError {
    /// 是否为传输层失败 (计入 error_count 的那一类)
    pub fn is_transport(&self) -> bool {
        matches!(self, SpiderError::Transport(_) | SpiderError::Body(_))
    }

    /// 是否在发起网络请求之前就被拒绝
    pub fn is_rejected_early(&self) -> bool {
        matches!(
            self,
            SpiderError::UnsupportedMethod(_)
                | SpiderError::UnknownVerb(_)
                | SpiderError::InvalidMethod(_)
                | SpiderError::InvalidUrl { .. }
                | SpiderError::InvalidHeader(_)
                | SpiderError::FormEncoding(_)
        )
    }
}
