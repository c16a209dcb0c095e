use aws_sdk_cognitoidentityprovider::types::{AttributeType, AuthFlowType};
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::Config;
use crate::error::{DispatchError, Result};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    /// Cognito username (`sub`) the refresh token was issued to; needed for the secret hash.
    pub username: String,
    pub refresh_token: String,
}

#[derive(Serialize, Debug)]
pub struct LoginResponse {
    pub id_token: String,
    pub access_token: String,
    /// Empty on refresh; Cognito keeps the original refresh token valid.
    pub refresh_token: String,
    pub expires_in: i32,
}

#[derive(Serialize, Debug)]
pub struct SignupResponse {
    pub message: String,
    pub user_sub: String,
    pub confirmed: bool,
}

type HmacSha256 = Hmac<Sha256>;

/// Compute the SECRET_HASH for Cognito authentication
pub fn compute_secret_hash(username: &str, client_id: &str, client_secret: &str) -> Result<String> {
    let message = format!("{}{}", username, client_id);
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .map_err(|e| DispatchError::Internal(format!("Invalid HMAC key: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

fn client_credentials(config: &Config) -> Result<(&str, &str)> {
    match (&config.cognito_client_id, &config.cognito_client_secret) {
        (Some(id), Some(secret)) => Ok((id.as_str(), secret.as_str())),
        _ => Err(DispatchError::Internal(
            "COGNITO_CLIENT_ID and COGNITO_CLIENT_SECRET must be set".to_string(),
        )),
    }
}

/// Map a Cognito error string to something safe to show a user.
fn login_failure_message(error_message: &str) -> &'static str {
    if error_message.contains("NotAuthorizedException") {
        "Incorrect email or password"
    } else if error_message.contains("UserNotConfirmedException") {
        "Please verify your email before logging in"
    } else if error_message.contains("UserNotFoundException") {
        "No account found with this email"
    } else if error_message.contains("PasswordResetRequiredException") {
        "Password reset required"
    } else if error_message.contains("TooManyRequestsException") {
        "Too many login attempts. Please try again later"
    } else {
        "Login failed. Please check your credentials"
    }
}

fn signup_failure_message(error_message: &str) -> &'static str {
    if error_message.contains("InvalidPasswordException") {
        "Password must contain at least 8 characters with uppercase, lowercase, number, and special character"
    } else if error_message.contains("UsernameExistsException") {
        "An account with this email already exists"
    } else if error_message.contains("InvalidParameterException") {
        "Invalid email or password format"
    } else {
        "Signup failed. Please check your credentials and try again."
    }
}

/// Handle user login with Cognito
pub async fn login(cognito_client: &CognitoClient, config: &Config, body: &[u8]) -> Result<LoginResponse> {
    let req: LoginRequest = serde_json::from_slice(body)?;
    let (client_id, client_secret) = client_credentials(config)?;

    tracing::info!("Authenticating user: {}", req.email);

    let secret_hash = compute_secret_hash(&req.email, client_id, client_secret)?;
    let response = cognito_client
        .initiate_auth()
        .auth_flow(AuthFlowType::UserPasswordAuth)
        .client_id(client_id)
        .auth_parameters("USERNAME", &req.email)
        .auth_parameters("PASSWORD", &req.password)
        .auth_parameters("SECRET_HASH", &secret_hash)
        .send()
        .await
        .map_err(|e| {
            let error_message = format!("{:?}", e);
            tracing::error!("Cognito authentication error: {}", error_message);
            DispatchError::Unauthenticated(login_failure_message(&error_message).to_string())
        })?;

    let auth_result = response.authentication_result().ok_or_else(|| {
        DispatchError::Unauthenticated("No authentication result returned".to_string())
    })?;

    tracing::info!("Authentication successful for user: {}", req.email);
    Ok(LoginResponse {
        id_token: auth_result.id_token().unwrap_or_default().to_string(),
        access_token: auth_result.access_token().unwrap_or_default().to_string(),
        refresh_token: auth_result.refresh_token().unwrap_or_default().to_string(),
        expires_in: auth_result.expires_in(),
    })
}

/// Handle user signup with Cognito. The profile itself is created afterwards
/// through `POST /users` and waits for approval.
pub async fn signup(cognito_client: &CognitoClient, config: &Config, body: &[u8]) -> Result<SignupResponse> {
    let req: SignupRequest = serde_json::from_slice(body)?;
    let (client_id, client_secret) = client_credentials(config)?;

    tracing::info!("Signing up user: {}", req.email);

    let secret_hash = compute_secret_hash(&req.email, client_id, client_secret)?;
    let email_attribute = AttributeType::builder()
        .name("email")
        .value(&req.email)
        .build()
        .map_err(|e| DispatchError::Internal(format!("Failed to build attribute: {:?}", e)))?;

    let output = cognito_client
        .sign_up()
        .client_id(client_id)
        .username(&req.email)
        .password(&req.password)
        .secret_hash(&secret_hash)
        .user_attributes(email_attribute)
        .send()
        .await
        .map_err(|e| {
            let error_message = format!("{:?}", e);
            tracing::error!("Cognito signup error: {}", error_message);
            DispatchError::InvalidArgument(signup_failure_message(&error_message).to_string())
        })?;

    let mut confirmed = output.user_confirmed();
    match &config.cognito_user_pool_id {
        Some(user_pool_id) if !confirmed => {
            match cognito_client
                .admin_confirm_sign_up()
                .user_pool_id(user_pool_id)
                .username(&req.email)
                .send()
                .await
            {
                Ok(_) => {
                    confirmed = true;
                    tracing::info!("User auto-confirmed: {}", req.email);
                }
                // Not fatal; the user can still verify by email
                Err(e) => tracing::error!("Failed to auto-confirm user: {:?}", e),
            }
        }
        Some(_) => {}
        None => tracing::warn!("COGNITO_USER_POOL_ID not set; skipping auto-confirm"),
    }

    Ok(SignupResponse {
        message: "Signup successful".to_string(),
        user_sub: output.user_sub().to_string(),
        confirmed,
    })
}

/// Exchange a refresh token for new id/access tokens
pub async fn refresh_token(cognito_client: &CognitoClient, config: &Config, body: &[u8]) -> Result<LoginResponse> {
    let req: RefreshRequest = serde_json::from_slice(body)?;
    let (client_id, client_secret) = client_credentials(config)?;

    let secret_hash = compute_secret_hash(&req.username, client_id, client_secret)?;
    let response = cognito_client
        .initiate_auth()
        .auth_flow(AuthFlowType::RefreshTokenAuth)
        .client_id(client_id)
        .auth_parameters("REFRESH_TOKEN", &req.refresh_token)
        .auth_parameters("SECRET_HASH", &secret_hash)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Cognito refresh error: {:?}", e);
            DispatchError::Unauthenticated("Session expired. Please log in again".to_string())
        })?;

    let auth_result = response.authentication_result().ok_or_else(|| {
        DispatchError::Unauthenticated("No authentication result returned".to_string())
    })?;

    Ok(LoginResponse {
        id_token: auth_result.id_token().unwrap_or_default().to_string(),
        access_token: auth_result.access_token().unwrap_or_default().to_string(),
        refresh_token: auth_result.refresh_token().unwrap_or_default().to_string(),
        expires_in: auth_result.expires_in(),
    })
}
