//! Resolving who is calling.

use lambda_http::{Request, RequestExt};

use crate::error::{DispatchError, Result};
use crate::store::DispatchStore;
use crate::types::AppUser;

fn jwt_subject(event: &Request) -> Option<String> {
    event
        .request_context_ref()
        .and_then(|ctx| ctx.authorizer())
        .and_then(|auth| auth.jwt.as_ref())
        .and_then(|jwt| jwt.claims.get("sub"))
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
}

fn dev_header(event: &Request) -> Option<String> {
    event
        .headers()
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
}

/// Caller id from the JWT `sub` claim placed in the request context by the
/// API Gateway authorizer. With `dev_identity` the `X-User-Id` header is
/// accepted when no verified claim is present.
pub fn caller_id(event: &Request, dev_identity: bool) -> Option<String> {
    jwt_subject(event).or_else(|| {
        if dev_identity {
            dev_header(event)
        } else {
            None
        }
    })
}

pub fn require_caller_id(event: &Request, dev_identity: bool) -> Result<String> {
    caller_id(event, dev_identity)
        .ok_or_else(|| DispatchError::Unauthenticated("Missing caller identity".to_string()))
}

/// Load the caller's profile. A caller without a profile is treated as
/// unauthenticated for everything but profile creation.
pub async fn load_actor(store: &dyn DispatchStore, event: &Request, dev_identity: bool) -> Result<AppUser> {
    let user_id = require_caller_id(event, dev_identity)?;
    match store.get_user(&user_id).await? {
        Some(user) => {
            tracing::debug!("Caller {} ({})", user.user_id, user.role.as_str());
            Ok(user)
        }
        None => Err(DispatchError::Unauthenticated(format!(
            "No profile for user {}",
            user_id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::aws_lambda_events::apigw::{
        ApiGatewayRequestAuthorizer, ApiGatewayRequestAuthorizerJwtDescription,
        ApiGatewayV2httpRequestContext,
    };
    use lambda_http::request::RequestContext;
    use lambda_http::Body;

    fn with_jwt_subject(event: Request, sub: &str) -> Request {
        let mut jwt = ApiGatewayRequestAuthorizerJwtDescription::default();
        jwt.claims.insert("sub".to_string(), sub.to_string());
        let mut authorizer = ApiGatewayRequestAuthorizer::default();
        authorizer.jwt = Some(jwt);
        let mut ctx = ApiGatewayV2httpRequestContext::default();
        ctx.authorizer = Some(authorizer);
        event.with_request_context(RequestContext::ApiGatewayV2(ctx))
    }

    fn request(header: Option<&str>) -> Request {
        let mut builder = lambda_http::http::Request::builder().uri("/users/me");
        if let Some(user_id) = header {
            builder = builder.header("X-User-Id", user_id);
        }
        builder.body(Body::Empty).unwrap()
    }

    #[test]
    fn test_caller_id_from_header_in_dev_mode() {
        let event = request(Some("user-42"));
        assert_eq!(caller_id(&event, true).as_deref(), Some("user-42"));
    }

    #[test]
    fn test_header_ignored_outside_dev_mode() {
        let event = request(Some("admin-1"));
        assert!(caller_id(&event, false).is_none());
        assert!(matches!(
            require_caller_id(&event, false),
            Err(DispatchError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_jwt_subject_wins_over_spoofed_header() {
        let event = with_jwt_subject(request(Some("admin-1")), "closer-1");
        assert_eq!(caller_id(&event, false).as_deref(), Some("closer-1"));
        assert_eq!(caller_id(&event, true).as_deref(), Some("closer-1"));
    }

    #[test]
    fn test_missing_identity_is_unauthenticated() {
        let event = request(None);
        assert!(caller_id(&event, true).is_none());
        assert!(matches!(
            require_caller_id(&event, true),
            Err(DispatchError::Unauthenticated(_))
        ));
    }
}
