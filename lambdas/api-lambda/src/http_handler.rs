use dispatch_shared::error::{DispatchError, Result as DispatchResult};
use dispatch_shared::responses::{cors_preflight, json_response, method_not_allowed, not_found, respond};
use dispatch_shared::types::{
    AcceptJobRequest, AcceptLeadRequest, AppUser, ApproveUserRequest, AssignTeamRequest,
    CompleteLeadRequest, CreateLeadRequest, CreateTeamRequest, CreateUserRequest,
    PhotoUploadRequest, ScheduleLeadRequest, SetRoleRequest,
};
use dispatch_shared::{auth, context, leads, photos, teams, users, AppState};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> DispatchResult<T> {
    Ok(serde_json::from_slice(body)?)
}

/// Like `parse_body`, but an empty body means "no options".
fn parse_optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> DispatchResult<T> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }
    parse_body(body)
}

fn query_param(event: &Request, name: &str) -> Option<String> {
    event
        .query_string_parameters_ref()
        .and_then(|params| params.first(name))
        .map(|s| s.to_string())
}

/// Main Lambda handler - routes requests to auth, user, team and lead endpoints
pub(crate) async fn function_handler(event: Request, state: Arc<AppState>) -> Result<Response<Body>, Error> {
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    let body: &[u8] = event.body();
    tracing::info!("Lead dispatch API invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return cors_preflight();
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // Public routes
    match (&method, parts.as_slice()) {
        (&Method::GET, ["health"]) => {
            return json_response(
                StatusCode::OK,
                &serde_json::json!({"status": "ok", "service": "lead-dispatch"}),
            )
        }
        (&Method::POST, ["login"]) => {
            return respond(StatusCode::OK, auth::login(&state.cognito_client, &state.config, body).await)
        }
        (&Method::POST, ["signup"]) => {
            return respond(StatusCode::OK, auth::signup(&state.cognito_client, &state.config, body).await)
        }
        (&Method::POST, ["refresh"]) => {
            return respond(
                StatusCode::OK,
                auth::refresh_token(&state.cognito_client, &state.config, body).await,
            )
        }
        (_, ["health"]) | (_, ["login"]) | (_, ["signup"]) | (_, ["refresh"]) => return method_not_allowed(),
        _ => {}
    }

    // Profile routes only need an identity, not an approved profile
    match (&method, parts.as_slice()) {
        (&Method::POST, ["users"]) => {
            let result = match context::require_caller_id(&event, state.config.dev_identity) {
                Ok(user_id) => match parse_body::<CreateUserRequest>(body) {
                    Ok(req) => users::create_profile(state.store.as_ref(), &user_id, req).await,
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            };
            return respond(StatusCode::CREATED, result);
        }
        (&Method::GET, ["users", "me"]) => {
            let result = match context::require_caller_id(&event, state.config.dev_identity) {
                Ok(user_id) => users::get_profile(state.store.as_ref(), &user_id).await,
                Err(e) => Err(e),
            };
            return respond(StatusCode::OK, result);
        }
        _ => {}
    }

    // All other routes require an existing profile
    let actor = match context::load_actor(state.store.as_ref(), &event, state.config.dev_identity).await {
        Ok(actor) => actor,
        Err(e) => return e.into_response(),
    };
    tracing::info!("Caller: {} ({})", actor.user_id, actor.role.as_str());

    match (&method, parts.as_slice()) {
        // --- USERS ---
        (&Method::GET, ["users", "pending"]) => {
            respond(StatusCode::OK, users::list_pending_approvals(state.store.as_ref(), &actor).await)
        }
        (&Method::POST, ["users", user_id, "approve"]) => {
            respond(StatusCode::OK, approve(&state, &actor, user_id).await)
        }
        (&Method::POST, ["approveUser"]) => {
            let result = match parse_body::<ApproveUserRequest>(body) {
                Ok(req) => approve(&state, &actor, &req.user_id).await,
                Err(e) => Err(e),
            };
            respond(StatusCode::OK, result)
        }
        (&Method::PATCH, ["users", user_id, "team"]) => {
            let result = match parse_body::<AssignTeamRequest>(body) {
                Ok(req) => users::assign_team(state.store.as_ref(), &actor, user_id, &req.team_id).await,
                Err(e) => Err(e),
            };
            respond(StatusCode::OK, result)
        }
        (&Method::PATCH, ["users", user_id, "role"]) => {
            let result = match parse_body::<SetRoleRequest>(body) {
                Ok(req) => users::set_role(state.store.as_ref(), &actor, user_id, req.role).await,
                Err(e) => Err(e),
            };
            respond(StatusCode::OK, result)
        }

        // --- TEAMS ---
        (&Method::GET, ["teams"]) => respond(StatusCode::OK, teams::list_teams(state.store.as_ref(), &actor).await),
        (&Method::POST, ["teams"]) => {
            let result = match parse_body::<CreateTeamRequest>(body) {
                Ok(req) => teams::create_team(state.store.as_ref(), &actor, req).await,
                Err(e) => Err(e),
            };
            respond(StatusCode::CREATED, result)
        }
        (&Method::GET, ["teams", team_id]) => {
            respond(StatusCode::OK, teams::get_team(state.store.as_ref(), &actor, team_id).await)
        }
        (&Method::GET, ["teams", team_id, "closers"]) => respond(
            StatusCode::OK,
            teams::list_team_closers(state.store.as_ref(), &actor, team_id).await,
        ),
        (&Method::GET, ["teams", team_id, "leads"]) => respond(
            StatusCode::OK,
            leads::list_team_leads(state.store.as_ref(), &actor, team_id).await,
        ),
        (&Method::GET, ["teams", team_id, "scheduled"]) => {
            let start = query_param(&event, "start").unwrap_or_default();
            let end = query_param(&event, "end").unwrap_or_default();
            respond(
                StatusCode::OK,
                leads::scheduled_queue(state.store.as_ref(), &actor, team_id, &start, &end).await,
            )
        }

        // --- LEADS ---
        (&Method::POST, ["leads"]) => {
            let result = match parse_body::<CreateLeadRequest>(body) {
                Ok(req) => leads::create_lead(state.store.as_ref(), &actor, req).await,
                Err(e) => Err(e),
            };
            respond(StatusCode::CREATED, result)
        }
        (&Method::GET, ["leads", lead_id]) => {
            respond(StatusCode::OK, leads::get_lead(state.store.as_ref(), &actor, lead_id).await)
        }
        (&Method::GET, ["leads", lead_id, "activity"]) => {
            respond(StatusCode::OK, leads::list_activity(state.store.as_ref(), &actor, lead_id).await)
        }
        (&Method::POST, ["leads", lead_id, "accept"]) => {
            let result = match parse_optional_body::<AcceptLeadRequest>(body) {
                Ok(req) => {
                    leads::accept_lead(state.store.as_ref(), &actor, lead_id, req.on_behalf_of.as_deref()).await
                }
                Err(e) => Err(e),
            };
            respond(StatusCode::OK, result)
        }
        (&Method::POST, ["acceptJob"]) => {
            let result = match parse_body::<AcceptJobRequest>(body) {
                Ok(req) => {
                    leads::accept_lead(state.store.as_ref(), &actor, &req.lead_id, req.on_behalf_of.as_deref())
                        .await
                }
                Err(e) => Err(e),
            };
            respond(StatusCode::OK, result)
        }
        (&Method::POST, ["leads", lead_id, "schedule"]) => {
            let result = match parse_body::<ScheduleLeadRequest>(body) {
                Ok(req) => leads::schedule_lead(state.store.as_ref(), &actor, lead_id, req).await,
                Err(e) => Err(e),
            };
            respond(StatusCode::OK, result)
        }
        (&Method::POST, ["leads", lead_id, "complete"]) => {
            let result = match parse_body::<CompleteLeadRequest>(body) {
                Ok(req) => leads::complete_lead(state.store.as_ref(), &actor, lead_id, req).await,
                Err(e) => Err(e),
            };
            respond(StatusCode::OK, result)
        }
        (&Method::POST, ["leads", lead_id, "verify"]) => {
            respond(StatusCode::OK, leads::verify_lead(state.store.as_ref(), &actor, lead_id).await)
        }
        (&Method::POST, ["leads", lead_id, "photos"]) => {
            respond(StatusCode::OK, photo_upload(&state, &actor, lead_id, body).await)
        }

        (_, ["users", ..]) | (_, ["teams", ..]) | (_, ["leads", ..]) => not_found(),
        _ => {
            tracing::warn!("No route for {} {}", method, path);
            not_found()
        }
    }
}

async fn approve(state: &AppState, actor: &AppUser, user_id: &str) -> DispatchResult<AppUser> {
    users::approve_user(state.store.as_ref(), state.mailer.as_ref(), actor, user_id).await
}

async fn photo_upload(
    state: &AppState,
    actor: &AppUser,
    lead_id: &str,
    body: &[u8],
) -> DispatchResult<photos::PhotoUpload> {
    let req: PhotoUploadRequest = parse_body(body)?;
    if req.file_name.trim().is_empty() {
        return Err(DispatchError::InvalidArgument("file_name is required".to_string()));
    }
    let lead = leads::authorize_photo_upload(state.store.as_ref(), actor, lead_id).await?;
    photos::presigned_photo_upload(
        &state.s3_client,
        &state.config.photo_bucket,
        &lead.lead_id,
        &req.file_name,
        &req.content_type,
    )
    .await
}
