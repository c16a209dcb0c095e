use lambda_http::request::RequestContext;
use lambda_http::{http::StatusCode, Body, Error, Request, RequestExt, Response};
use std::sync::Arc;

use super::connections::{register_connection, unregister_connection};
use super::messages::{WebSocketAction, WebSocketMessage};
use crate::error::DispatchError;
use crate::responses::respond;
use crate::types::{AcceptJobRequest, Lead};
use crate::{context, leads, AppState};

/// Route key and connection id of a WebSocket event, or `None` for HTTP.
pub fn websocket_route(event: &Request) -> Option<(String, String)> {
    if let Some(RequestContext::WebSocket(ctx)) = event.request_context_ref() {
        let route_key = ctx.route_key.clone().unwrap_or_else(|| "$default".to_string());
        let connection_id = ctx.connection_id.clone().unwrap_or_default();
        return Some((route_key, connection_id));
    }

    // Local invocations carry the same data as headers
    let header = |names: [&str; 2]| {
        names
            .iter()
            .find_map(|name| event.headers().get(*name))
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };
    match (header(["routekey", "routeKey"]), header(["connectionid", "connectionId"])) {
        (Some(route_key), Some(connection_id)) => Some((route_key, connection_id)),
        _ => None,
    }
}

/// Handle WebSocket events ($connect, $disconnect, $default)
pub async fn handle_websocket_event(event: Request, state: Arc<AppState>) -> Result<Response<Body>, Error> {
    let (route_key, connection_id) = match websocket_route(&event) {
        Some(route) => route,
        None => {
            return DispatchError::InvalidArgument("Not a WebSocket event".to_string()).into_response()
        }
    };

    tracing::info!("WebSocket event: {} for connection: {}", route_key, connection_id);

    match route_key.as_str() {
        "$connect" => handle_connect(event, state, &connection_id).await,
        "$disconnect" => handle_disconnect(state, &connection_id).await,
        "$default" => handle_message(event, state).await,
        _ => {
            tracing::warn!("Unknown WebSocket route: {}", route_key);
            Ok(Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(Body::Empty)
                .map_err(Box::new)?)
        }
    }
}

async fn handle_connect(event: Request, state: Arc<AppState>, connection_id: &str) -> Result<Response<Body>, Error> {
    let dev_identity = state.config.dev_identity;
    let user_id = context::caller_id(&event, dev_identity).or_else(|| {
        if !dev_identity {
            return None;
        }
        event
            .query_string_parameters_ref()
            .and_then(|params| params.first("user_id"))
            .map(|s| s.to_string())
    });

    let user_id = match user_id {
        Some(user_id) => user_id,
        None => {
            return DispatchError::Unauthenticated("Missing caller identity".to_string()).into_response()
        }
    };

    tracing::info!("WebSocket connect: {} (user: {})", connection_id, user_id);
    respond(
        StatusCode::OK,
        register_connection(state.store.as_ref(), connection_id, &user_id).await,
    )
}

async fn handle_disconnect(state: Arc<AppState>, connection_id: &str) -> Result<Response<Body>, Error> {
    tracing::info!("WebSocket disconnect: {}", connection_id);
    respond(
        StatusCode::OK,
        unregister_connection(state.store.as_ref(), connection_id)
            .await
            .map(|_| serde_json::json!({"disconnected": connection_id})),
    )
}

/// Handle $default event (incoming messages)
async fn handle_message(event: Request, state: Arc<AppState>) -> Result<Response<Body>, Error> {
    let message: WebSocketMessage = match serde_json::from_slice(event.body()) {
        Ok(msg) => msg,
        Err(e) => return DispatchError::from(e).into_response(),
    };

    tracing::info!("WebSocket message action: {}", message.action);

    match WebSocketAction::parse(&message.action) {
        Some(WebSocketAction::Ping) => respond(StatusCode::OK, Ok(serde_json::json!({"type": "pong"}))),
        Some(WebSocketAction::AcceptJob) => {
            respond(StatusCode::OK, accept_job(&event, &state, message.data).await)
        }
        None => {
            tracing::warn!("Unknown action: {}", message.action);
            DispatchError::InvalidArgument(format!("Unknown action: {}", message.action)).into_response()
        }
    }
}

async fn accept_job(event: &Request, state: &AppState, data: serde_json::Value) -> crate::error::Result<Lead> {
    let req: AcceptJobRequest = serde_json::from_value(data)?;
    let actor = context::load_actor(state.store.as_ref(), event, state.config.dev_identity).await?;
    leads::accept_lead(state.store.as_ref(), &actor, &req.lead_id, req.on_behalf_of.as_deref()).await
}
