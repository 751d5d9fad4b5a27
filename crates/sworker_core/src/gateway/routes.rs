//! Request routing: control endpoints under `/__worker/`, everything else is
//! a fetch event.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderValue, Method, StatusCode, request::Parts};
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, body::Incoming};
use serde::Deserialize;
use serde_json::json;
use sworker_cache::CacheStorage;
use sworker_http::{FetchRequest, FetchResponse, Fetcher, responses};
use tracing::{debug, warn};

use super::{
    GatewayState,
    convert::{forwardable_headers, into_hyper, is_local_file_page, json_response, request_url},
};
use crate::{
    dispatch::{ClientMessage, WorkerEvent, WorkerOutcome},
    interceptor::FetchEvent,
};

pub(crate) const CONTROL_PREFIX: &str = "/__worker/";
const OUTCOME_HEADER: &str = "x-sworker-outcome";

#[derive(Debug, Deserialize)]
struct ClickBody {
    #[serde(default)]
    action: String,
}

pub(crate) async fn handle_request<S, F>(
    req: Request<Incoming>,
    state: Arc<GatewayState<S, F>>,
) -> Result<Response<Full<Bytes>>, hyper::Error>
where
    S: CacheStorage + Clone + 'static,
    F: Fetcher + Clone + 'static,
{
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(target: "sworker::gateway", error = ?e, "Failed to read request body");
            return Ok(into_hyper(responses::bad_request()));
        }
    };

    let control_route = match parts.uri.scheme() {
        None => parts.uri.path().strip_prefix(CONTROL_PREFIX),
        Some(_) => None,
    };

    let response = match control_route {
        Some(route) => control(route, &parts, body, &state).await,
        None => fetch(&parts, body, &state).await,
    };
    Ok(into_hyper(response))
}

async fn fetch<S, F>(parts: &Parts, body: Bytes, state: &GatewayState<S, F>) -> FetchResponse
where
    S: CacheStorage + Clone + 'static,
    F: Fetcher + Clone + 'static,
{
    let url = request_url(&parts.uri, &state.scope);
    let request = FetchRequest::new(parts.method.clone(), url)
        .with_headers(forwardable_headers(&parts.headers))
        .with_body(body);
    let event = FetchEvent::new(request.clone()).from_local_file(is_local_file_page(&parts.headers));

    if let Some(interception) = state.registration.fetch(event).await {
        let mut response = interception.response;
        if let Ok(tag) = HeaderValue::from_str(&interception.outcome.to_string()) {
            response.headers_mut().insert(OUTCOME_HEADER, tag);
        }
        return response;
    }

    debug!(
        target: "sworker::gateway",
        method = %request.method(),
        url = %request.url(),
        "Forwarding request untouched"
    );
    match state.network.fetch(&request).await {
        Ok(response) => response,
        Err(err) => {
            warn!(target: "sworker::gateway", url = %request.url(), error = %err, "Pass-through fetch failed");
            responses::text_response(StatusCode::BAD_GATEWAY, "Bad Gateway")
        }
    }
}

async fn control<S, F>(
    route: &str,
    parts: &Parts,
    body: Bytes,
    state: &GatewayState<S, F>,
) -> FetchResponse
where
    S: CacheStorage + Clone + 'static,
    F: Fetcher + Clone + 'static,
{
    let post = parts.method == Method::POST;
    let get = parts.method == Method::GET;
    let registration = &state.registration;

    match route {
        "message" if post => {
            let message: ClientMessage = match serde_json::from_slice(&body) {
                Ok(message) => message,
                Err(err) => {
                    debug!(target: "sworker::gateway", error = %err, "Malformed client message");
                    return responses::bad_request();
                }
            };
            match registration.post_message(message).await {
                Ok(report) => json_response(StatusCode::OK, &json!({ "activated": report })),
                Err(err) => {
                    warn!(target: "sworker::gateway", error = %err, "Skip-waiting activation failed");
                    responses::internal_error()
                }
            }
        }
        "push" if post => {
            let payload = (!body.is_empty()).then(|| String::from_utf8_lossy(&body).into_owned());
            match registration.dispatch(WorkerEvent::Push(payload)).await {
                Some(WorkerOutcome::Notify(notification)) => json_response(StatusCode::OK, &notification),
                Some(_) => responses::internal_error(),
                None => no_active_worker(),
            }
        }
        "notification-click" if post => {
            let click: ClickBody = match serde_json::from_slice(&body) {
                Ok(click) => click,
                Err(_) => return responses::bad_request(),
            };
            match registration
                .dispatch(WorkerEvent::NotificationClick(click.action))
                .await
            {
                Some(WorkerOutcome::OpenWindow(target)) => {
                    json_response(StatusCode::OK, &json!({ "open": target }))
                }
                Some(_) => responses::internal_error(),
                None => no_active_worker(),
            }
        }
        "events" if get => {
            let since = parts
                .uri
                .query()
                .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("since=")))
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap_or(0);
            json_response(StatusCode::OK, &registration.events_since(since))
        }
        "status" if get => json_response(StatusCode::OK, &registration.status()),
        r if post && r.starts_with("sync/") => {
            let tag = &r["sync/".len()..];
            if tag.is_empty() {
                return responses::bad_request();
            }
            match registration.dispatch(WorkerEvent::Sync(tag.to_string())).await {
                Some(WorkerOutcome::Swept(report)) => {
                    json_response(StatusCode::OK, &json!({ "tag": tag, "swept": report }))
                }
                Some(_) => json_response(StatusCode::OK, &json!({ "tag": tag, "swept": null })),
                None => no_active_worker(),
            }
        }
        "message" | "push" | "notification-click" | "events" | "status" => {
            responses::method_not_allowed()
        }
        r if r.starts_with("sync/") => responses::method_not_allowed(),
        _ => responses::not_found(),
    }
}

fn no_active_worker() -> FetchResponse {
    responses::text_response(StatusCode::SERVICE_UNAVAILABLE, "No active worker")
}
