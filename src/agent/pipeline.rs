//! 执行管线 (Execution Pipeline)
//!
//! 一个周期：前置钩子 -> 等待 -> 构造请求 -> 注入请求头 -> 传输 -> 读取响应体 -> 更新状态 -> 后置钩子。
//! 同一 Spider 上的周期由 `cycle` 锁串行化。

use std::sync::atomic::Ordering;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Response};
use tracing::{debug, warn};
use url::Url;

use crate::agent::Spider;
use crate::agent::state::{Record, RequestSnapshot, ResponseSnapshot};
use crate::core::error::{Result, SpiderError};
use crate::network::headers;

impl Spider {
    /// 执行一个完整周期并返回响应体
    ///
    /// - `content_type` 非空时覆盖调用方设置的 Content-Type；
    /// - `use_binary` 为真且 binary 非空时以 binary 作为请求体，否则回落到表单。
    ///
    /// 传输失败时 `error_count` 加一并立即返回，不调用后置钩子；
    /// 取得响应 (无论状态码) 时 `fetch_count` 加一。
    pub async fn execute(
        &self,
        method: Method,
        content_type: Option<&str>,
        use_binary: bool,
    ) -> Result<Bytes> {
        let _cycle = self.cycle.lock().await;

        let before = self.before.read().clone();
        if let Some(hook) = before {
            let pending = self.pending.read().clone();
            // 钩子可能回调 insert_context，不能持有读锁
            let ctx = self.context.read().clone();
            let pending = hook.before(&ctx, pending);
            *self.pending.write() = pending;
        }

        let wait = *self.wait.read();
        if !wait.is_zero() {
            debug!("等待 {:?} 后发送", wait);
            tokio::time::sleep(wait).await;
        }

        let pending = self.pending.read().clone();
        debug!("[Spider] {} {}", method, pending.url);

        let url = Url::parse(&pending.url).map_err(|source| SpiderError::InvalidUrl {
            url: pending.url.clone(),
            source,
        })?;
        let body = pending.body(use_binary)?;

        let mut headers = headers::merge(&pending.headers, self.transport.default_headers());
        if let Some(content_type) = content_type.filter(|ct| !ct.is_empty()) {
            let value = HeaderValue::from_str(content_type)
                .map_err(|e| SpiderError::InvalidHeader(format!("content-type: {}", e)))?;
            headers.insert(CONTENT_TYPE, value);
        }

        let mut request = reqwest::Request::new(method.clone(), url.clone());
        *request.headers_mut() = headers.clone();
        let body_len = body.as_ref().map_or(0, Bytes::len);
        if let Some(body) = body {
            *request.body_mut() = Some(body.into());
        }
        let snapshot = RequestSnapshot {
            method,
            url,
            headers,
            body_len,
        };

        let response = match self.transport.client().execute(request).await {
            Ok(resp) => resp,
            Err(e) => {
                self.error_count.fetch_add(1, Ordering::SeqCst);
                warn!("请求失败 [{} {}]: {}", snapshot.method, snapshot.url, e);
                return Err(SpiderError::Transport(e));
            }
        };

        let meta = ResponseSnapshot::from_response(&response);
        let body = match drain(response).await {
            Ok(body) => body,
            Err(e) => {
                self.error_count.fetch_add(1, Ordering::SeqCst);
                warn!("读取响应体失败 [{}]: {}", snapshot.url, e);
                return Err(SpiderError::Body(e));
            }
        };
        debug!("[Spider] {:?} {} ({} bytes)", meta.version, meta.status, body.len());

        *self.record.write() = Record {
            body: body.clone(),
            status: Some(meta.status),
            request: Some(snapshot),
            response: Some(meta),
            previous_url: Some(pending.url),
        };
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        let after = self.after.read().clone();
        if let Some(hook) = after {
            let record = self.record.read().clone();
            let pending = self.pending.read().clone();
            let ctx = self.context.read().clone();
            let pending = hook.after(&ctx, &record, pending);
            *self.pending.write() = pending;
        }

        Ok(body)
    }
}

/// 完整读取响应体，连接按块交付时逐块拼接
async fn drain(response: Response) -> reqwest::Result<Bytes> {
    let mut stream = response.bytes_stream();
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}
