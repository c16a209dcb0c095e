pub mod types;
pub mod error;
pub mod config;
pub mod guard;
pub mod schedule;
pub mod store;
pub mod context;
pub mod responses;
pub mod leads;
pub mod users;
pub mod teams;
pub mod auth;
pub mod email;
pub mod photos;
pub mod notifications;
pub mod audit;
pub mod sockets;

use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_s3::Client as S3Client;
use std::sync::Arc;

use config::Config;
use email::ApprovalMailer;
use store::DispatchStore;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DispatchStore>,
    pub mailer: Arc<dyn ApprovalMailer>,
    pub cognito_client: CognitoClient,
    pub s3_client: S3Client,
    pub api_gateway_client: Option<ApiGatewayManagementClient>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn DispatchStore>,
        mailer: Arc<dyn ApprovalMailer>,
        cognito_client: CognitoClient,
        s3_client: S3Client,
        api_gateway_client: Option<ApiGatewayManagementClient>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            mailer,
            cognito_client,
            s3_client,
            api_gateway_client,
        })
    }
}
