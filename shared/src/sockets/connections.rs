use chrono::Utc;

use crate::error::Result;
use crate::store::DispatchStore;
use crate::types::Connection;

/// Register a WebSocket connection under the team of the connecting user.
/// Users without a profile or team still connect but receive nothing.
pub async fn register_connection(
    store: &dyn DispatchStore,
    connection_id: &str,
    user_id: &str,
) -> Result<Connection> {
    let team_id = store.get_user(user_id).await?.and_then(|user| user.team_id);
    if team_id.is_none() {
        tracing::warn!("Connection {} for user {} has no team", connection_id, user_id);
    }

    let connection = Connection {
        connection_id: connection_id.to_string(),
        user_id: user_id.to_string(),
        team_id,
        connected_at: Utc::now(),
    };
    store.save_connection(&connection).await?;
    Ok(connection)
}

pub async fn unregister_connection(store: &dyn DispatchStore, connection_id: &str) -> Result<()> {
    store.remove_connection(connection_id).await
}
