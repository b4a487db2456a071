//! Spider 状态模型
//!
//! `PendingRequest` 是下一周期要发送的内容，`Record` 是最近一个成功周期的结果。

use bytes::Bytes;
use indexmap::IndexMap;
use reqwest::header::HeaderMap;
use reqwest::{Method, Response, StatusCode, Version};
use url::Url;

use crate::agent::verb::Verb;
use crate::core::error::Result;

/// 表单字段，保持插入顺序
pub type FormData = IndexMap<String, Vec<String>>;

/// 待发送请求
#[derive(Debug, Clone, Default)]
pub struct PendingRequest {
    pub url: String,
    /// `go_auto` 使用的动词
    pub method: Verb,
    pub headers: HeaderMap,
    pub form: FormData,
    pub binary: Bytes,
}

impl PendingRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// 清空请求体 (表单与二进制)
    pub fn clear_body(&mut self) {
        self.form.clear();
        self.binary = Bytes::new();
    }

    /// 表单的 URL 编码形式，表单为空时返回 `None`
    pub fn encode_form(&self) -> Result<Option<String>> {
        if self.form.is_empty() {
            return Ok(None);
        }
        let pairs: Vec<(&str, &str)> = self
            .form
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
            .collect();
        Ok(Some(serde_urlencoded::to_string(pairs)?))
    }

    /// 选择请求体：binary 优先 (需 `use_binary` 且非空)，其次表单，否则无请求体
    pub fn body(&self, use_binary: bool) -> Result<Option<Bytes>> {
        if use_binary && !self.binary.is_empty() {
            return Ok(Some(self.binary.clone()));
        }
        Ok(self.encode_form()?.map(Bytes::from))
    }
}

/// 已发送请求的快照
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body_len: usize,
}

/// 响应元数据快照 (响应体单独保存在 `Record::body`)
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    /// 最终 URL (跟随重定向后)
    pub url: Url,
}

impl ResponseSnapshot {
    pub fn from_response(resp: &Response) -> Self {
        Self {
            status: resp.status(),
            version: resp.version(),
            headers: resp.headers().clone(),
            url: resp.url().clone(),
        }
    }
}

/// 最近一个成功周期的结果
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub body: Bytes,
    pub status: Option<StatusCode>,
    pub request: Option<RequestSnapshot>,
    pub response: Option<ResponseSnapshot>,
    pub previous_url: Option<String>,
}

impl Record {
    /// 响应体的文本形式 (非法 UTF-8 以替换字符呈现)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// 把 JSON 响应体重新格式化为缩进形式；空响应体返回空串
    pub fn json_pretty(&self) -> Result<String> {
        if self.body.is_empty() {
            return Ok(String::new());
        }
        let value: serde_json::Value = serde_json::from_slice(&self.body)?;
        Ok(serde_json::to_string_pretty(&value)?)
    }
}
