use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    let method = req.method.clone();
    let resp = route(state, &req);
    if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        // Full detail stays server-side; the wire carries the reduced shape.
        tracing::warn!(
            method = %method,
            code = resp["error"]["code"].as_str().unwrap_or("?"),
            message = resp["error"]["message"].as_str().unwrap_or(""),
            "request failed"
        );
    }
    resp
}

fn route(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::auth::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::companies::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::courses::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::builder::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::learning::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::enrollments::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::reports::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::assets::try_handle(state, req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
