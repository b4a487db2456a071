use reqwest::header::HeaderMap;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use tracing::{Level, enabled, trace};

/// 请求追踪中间件
///
/// 在 trace 级别输出每次往返的请求头、状态行与响应头。
pub struct TraceMiddleware;

#[async_trait::async_trait]
impl Middleware for TraceMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if enabled!(Level::TRACE) {
            trace!("--> {} {}", req.method(), req.url());
            dump_headers("Request header", req.headers());
        }

        let resp = next.run(req, extensions).await?;

        if enabled!(Level::TRACE) {
            trace!("<-- {:?} {}", resp.version(), resp.status());
            dump_headers("Response header", resp.headers());
        }
        Ok(resp)
    }
}

fn dump_headers(title: &str, headers: &HeaderMap) {
    for (name, value) in headers {
        trace!("{}: {} = {}", title, name, String::from_utf8_lossy(value.as_bytes()));
    }
}
