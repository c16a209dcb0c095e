use aws_lambda_events::event::dynamodb::{Event, EventRecord};
use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use dispatch_shared::config::Config;
use dispatch_shared::notifications::notification_for_change;
use dispatch_shared::sockets::broadcast::broadcast_to_team;
use dispatch_shared::store::dynamo::{item_from_json, item_to_lead};
use dispatch_shared::store::DynamoStore;
use dispatch_shared::types::Lead;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing_subscriber::EnvFilter;

struct Clients {
    store: DynamoStore,
    api_gateway_client: ApiGatewayManagementClient,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_env();
    let sdk_config = aws_config::load_from_env().await;

    let ws_endpoint = config
        .ws_api_endpoint
        .clone()
        .ok_or("WS_API_ENDPOINT must be set for stream handler")?;
    let api_config = aws_sdk_apigatewaymanagement::config::Builder::from(&sdk_config)
        .endpoint_url(ws_endpoint)
        .build();

    let clients = Clients {
        store: DynamoStore::new(DynamoClient::new(&sdk_config), &config.table_name),
        api_gateway_client: ApiGatewayManagementClient::from_conf(api_config),
    };
    let clients = &clients;

    run(service_fn(move |event: LambdaEvent<Event>| async move {
        function_handler(event, clients).await
    }))
    .await
}

async fn function_handler(event: LambdaEvent<Event>, clients: &Clients) -> Result<(), Error> {
    tracing::info!("DynamoDB Stream event received with {} records", event.payload.records.len());

    // One bad record must not block the rest of the batch
    for record in &event.payload.records {
        if let Err(e) = process_record(record, clients).await {
            tracing::error!("Failed to process record {}: {}", record.event_id, e);
        }
    }

    Ok(())
}

async fn process_record(record: &EventRecord, clients: &Clients) -> Result<(), Error> {
    let old_image = serde_json::to_value(&record.change.old_image)?;
    let new_image = serde_json::to_value(&record.change.new_image)?;

    let (old, new) = match lead_change(&record.event_name, &old_image, &new_image)? {
        Some(change) => change,
        None => return Ok(()),
    };

    let message = notification_for_change(old.as_ref(), &new);
    let delivered = broadcast_to_team(&clients.store, &clients.api_gateway_client, &new.team_id, &message).await?;

    tracing::info!("Broadcast {} for lead {} to {} clients", message.r#type, new.lead_id, delivered);
    Ok(())
}

fn is_lead_image(image: &serde_json::Value) -> bool {
    image
        .get("entity_type")
        .and_then(|v| v.get("S"))
        .and_then(|v| v.as_str())
        == Some("lead")
}

/// Old and new lead for INSERT / MODIFY records of lead items. Everything
/// else (activity, users, connections, deletes) yields `None`.
fn lead_change(
    event_name: &str,
    old_image: &serde_json::Value,
    new_image: &serde_json::Value,
) -> Result<Option<(Option<Lead>, Lead)>, Error> {
    if !matches!(event_name, "INSERT" | "MODIFY") || !is_lead_image(new_image) {
        return Ok(None);
    }

    let new = item_to_lead(&item_from_json(new_image)?)?;
    let old = if event_name == "MODIFY" && is_lead_image(old_image) {
        Some(item_to_lead(&item_from_json(old_image)?)?)
    } else {
        None
    };
    Ok(Some((old, new)))
}
