use http::Extensions;

use crate::agent::state::{PendingRequest, Record};

/// 周期前置钩子
///
/// 在请求构造之前同步执行，可改写待发送请求 (URL、请求头、请求体)。
/// 返回值会写回 Spider，本周期与后续周期都使用改写后的值。
pub trait BeforeHook: Send + Sync {
    fn before(&self, ctx: &Extensions, pending: PendingRequest) -> PendingRequest;
}

/// 周期后置钩子
///
/// 只在成功取得响应后执行，可观察本周期的结果并为下一周期改写待发送请求。
/// 传输失败的周期不会调用。
pub trait AfterHook: Send + Sync {
    fn after(&self, ctx: &Extensions, record: &Record, pending: PendingRequest) -> PendingRequest;
}

impl<F> BeforeHook for F
where
    F: Fn(&Extensions, PendingRequest) -> PendingRequest + Send + Sync,
{
    fn before(&self, ctx: &Extensions, pending: PendingRequest) -> PendingRequest {
        self(ctx, pending)
    }
}

impl<F> AfterHook for F
where
    F: Fn(&Extensions, &Record, PendingRequest) -> PendingRequest + Send + Sync,
{
    fn after(&self, ctx: &Extensions, record: &Record, pending: PendingRequest) -> PendingRequest {
        self(ctx, record, pending)
    }
}
