use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, OriginalUri, State},
    http::{header::USER_AGENT, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use keystone_core::UserId;
use keystone_infra::audit::RequestMeta;

use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestContext;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const TRACE_ID_HEADER: &str = "x-trace-id";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Resolve identity, trace id and client metadata into a [`RequestContext`].
///
/// The trace id is taken from the caller when present, otherwise generated,
/// and echoed on the response.
pub async fn context_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let headers = req.headers();
    let user_id = UserId::parse_present(header_str(headers, USER_ID_HEADER));
    let trace_id = header_str(headers, TRACE_ID_HEADER)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::now_v7().to_string());
    let user_agent = header_str(headers, USER_AGENT.as_str()).map(str::to_string);
    let ip_address = forwarded_for(headers).or_else(|| {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    });

    req.extensions_mut().insert(RequestContext::new(
        user_id,
        trace_id.clone(),
        ip_address,
        user_agent,
    ));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

/// URL-permission check for the routes listed in the route table.
///
/// Every decision is recorded in the audit trail; a failed audit write is
/// logged and does not change the response.
pub async fn permission_middleware(
    State(services): State<Arc<AppServices>>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_string();
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    if !services.routes.requires_check(&method, &path) {
        return next.run(req).await;
    }

    let started = Instant::now();
    let ctx = req.extensions().get::<RequestContext>().cloned();
    let user_id = ctx
        .as_ref()
        .and_then(|c| c.user_id())
        .map(|u| u.as_str().to_string());

    let decision = services
        .engine
        .decide(user_id.as_deref(), &path, &method)
        .await;

    let mut meta = RequestMeta {
        user_id,
        url: path,
        method,
        ip_address: ctx.as_ref().and_then(|c| c.ip_address()).map(str::to_string),
        user_agent: ctx.as_ref().and_then(|c| c.user_agent()).map(str::to_string),
        trace_id: ctx.as_ref().map(|c| c.trace_id().to_string()),
        response_time: None,
    };

    if let Some(refused) = authz::rejection(&decision) {
        meta.response_time = Some(elapsed_millis(started));
        services.record_decision(&decision, meta).await;
        return refused;
    }

    let response = next.run(req).await;
    meta.response_time = Some(elapsed_millis(started));
    services.record_decision(&decision, meta).await;
    response
}

fn elapsed_millis(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    header_str(headers, FORWARDED_FOR_HEADER)?
        .split(',')
        .map(str::trim)
        .find(|ip| !ip.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_forwarded_address_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static(" 10.0.0.1 , 10.0.0.2"));
        assert_eq!(forwarded_for(&headers).as_deref(), Some("10.0.0.1"));

        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static(" , "));
        assert_eq!(forwarded_for(&headers), None);
    }
}
