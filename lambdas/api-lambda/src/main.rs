use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_sesv2::Client as SesClient;
use dispatch_shared::config::{Config, StoreKind};
use dispatch_shared::email::{ApprovalMailer, LogMailer, SesMailer};
use dispatch_shared::store::{DispatchStore, DynamoStore, MemoryStore};
use dispatch_shared::AppState;
use lambda_http::{run, service_fn, tracing, Error, Request};
use std::sync::Arc;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = Config::from_env();
    // Initialize AWS clients once at startup
    let sdk_config = aws_config::load_from_env().await;

    // API Gateway Management client for WebSocket (optional endpoint)
    let api_gateway_client = config.ws_api_endpoint.as_ref().map(|endpoint| {
        let api_config = aws_sdk_apigatewaymanagement::config::Builder::from(&sdk_config)
            .endpoint_url(endpoint)
            .build();
        ApiGatewayManagementClient::from_conf(api_config)
    });

    let (store, mailer): (Arc<dyn DispatchStore>, Arc<dyn ApprovalMailer>) = match config.store {
        StoreKind::Dynamo => (
            Arc::new(DynamoStore::new(DynamoClient::new(&sdk_config), &config.table_name)),
            Arc::new(SesMailer::new(
                SesClient::new(&sdk_config),
                &config.email_from,
                &config.frontend_url,
            )),
        ),
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store; data is lost when the process exits");
            (Arc::new(MemoryStore::new()), Arc::new(LogMailer))
        }
    };

    tracing::info!("Lead dispatch API starting (table: {})", config.table_name);

    let state = AppState::new(
        config,
        store,
        mailer,
        CognitoClient::new(&sdk_config),
        S3Client::new(&sdk_config),
        api_gateway_client,
    );

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move {
            if dispatch_shared::sockets::handler::websocket_route(&event).is_some() {
                dispatch_shared::sockets::handle_websocket_event(event, state).await
            } else {
                http_handler::function_handler(event, state).await
            }
        }
    }))
    .await
}
