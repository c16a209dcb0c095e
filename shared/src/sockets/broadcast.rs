use aws_sdk_apigatewaymanagement::operation::post_to_connection::PostToConnectionError;
use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;

use super::messages::BroadcastMessage;
use crate::error::{DispatchError, Result};
use crate::store::DispatchStore;

/// Broadcast a message to every connection of a team. Connections the
/// gateway reports as gone are removed. Returns how many posts succeeded.
pub async fn broadcast_to_team(
    store: &dyn DispatchStore,
    api_gateway_client: &ApiGatewayManagementClient,
    team_id: &str,
    message: &BroadcastMessage,
) -> Result<usize> {
    let connections = store.list_team_connections(team_id).await?;
    let message_json = serde_json::to_string(message)
        .map_err(|e| DispatchError::Internal(format!("Failed to encode message: {}", e)))?;

    tracing::info!(
        "Broadcasting {} to {} connections of team {}",
        message.r#type,
        connections.len(),
        team_id
    );

    let mut delivered = 0;
    for conn in connections {
        let result = api_gateway_client
            .post_to_connection()
            .connection_id(&conn.connection_id)
            .data(message_json.as_bytes().to_vec().into())
            .send()
            .await;

        match result {
            Ok(_) => delivered += 1,
            Err(e) => {
                if let Some(PostToConnectionError::GoneException(_)) = e.as_service_error() {
                    tracing::info!("Removing stale connection {}", conn.connection_id);
                    if let Err(e) = store.remove_connection(&conn.connection_id).await {
                        tracing::warn!("Failed to remove connection {}: {}", conn.connection_id, e);
                    }
                } else {
                    tracing::warn!("Failed to send to connection {}: {:?}", conn.connection_id, e);
                }
            }
        }
    }

    Ok(delivered)
}
