use async_trait::async_trait;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue, ReturnValuesOnConditionCheckFailure};
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashMap;

use super::{DispatchStore, LeadUpdate};
use crate::error::{DispatchError, Result};
use crate::types::{
    ActivityAction, ActivityEntry, AppUser, Connection, DispatchType, Lead, LeadStatus,
    PendingApproval, Role, Team, UserStatus,
};

pub type Item = HashMap<String, AttributeValue>;

const GSI1: &str = "GSI1";
const PENDING_APPROVAL_PK: &str = "PENDING_APPROVAL";
const TEAMS_PK: &str = "TEAMS";
/// Older writers stored `accepted` under this name.
const LEGACY_ACCEPTED: &str = "in_process";

/// Single-table DynamoDB layout.
///
/// | item             | PK                 | SK                     | GSI1PK        | GSI1SK              |
/// |------------------|--------------------|------------------------|---------------|---------------------|
/// | lead             | `LEAD#{id}`        | `LEAD#{id}`            | `TEAM#{team}` | `LEAD#{created_at}` |
/// | activity         | `LEAD#{id}`        | `ACTIVITY#{at}#{uuid}` |               |                     |
/// | user             | `USER#{id}`        | `USER#{id}`            | `TEAM#{team}` | `USER#{id}`         |
/// | pending approval | `PENDING_APPROVAL` | `USER#{id}`            |               |                     |
/// | team             | `TEAM#{id}`        | `TEAM#{id}`            | `TEAMS`       | `TEAM#{id}`         |
/// | connection       | `CONNECTION#{id}`  | `CONNECTION#{id}`      | `TEAM#{team}` | `CONNECTION#{id}`   |
pub struct DynamoStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }

    /// Query `PK` (or `GSI1PK` with `index`) with a sort key prefix, following pagination.
    async fn query_prefix(&self, index: Option<&str>, pk: String, sk_prefix: &str) -> Result<Vec<Item>> {
        let (pk_name, sk_name) = match index {
            Some(_) => ("GSI1PK", "GSI1SK"),
            None => ("PK", "SK"),
        };

        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .set_index_name(index.map(|s| s.to_string()))
                .key_condition_expression(format!(
                    "{} = :pk AND begins_with({}, :sk_prefix)",
                    pk_name, sk_name
                ))
                .expression_attribute_values(":pk", AttributeValue::S(pk.clone()))
                .expression_attribute_values(":sk_prefix", AttributeValue::S(sk_prefix.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await?;

            items.extend(result.items().iter().cloned());

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        Ok(items)
    }

    async fn get_by_key(&self, pk: String) -> Result<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .send()
            .await?;
        Ok(result.item().cloned())
    }

    /// Put that refuses to overwrite an existing item.
    async fn put_new(&self, item: Item, what: &str) -> Result<()> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match e.into_service_error() {
                PutItemError::ConditionalCheckFailedException(_) => {
                    Err(DispatchError::Conflict(format!("{} already exists", what)))
                }
                other => Err(DispatchError::Internal(format!("DynamoDB put_item error: {:?}", other))),
            },
        }
    }

    async fn put(&self, item: Item) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await?;
        Ok(())
    }

    async fn delete(&self, pk: String, sk: String) -> Result<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk))
            .key("SK", AttributeValue::S(sk))
            .send()
            .await?;
        Ok(())
    }

    /// Every lead in the table, for the data-quality audit.
    async fn scan_leads(&self) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let result = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("entity_type = :type")
                .expression_attribute_values(":type", AttributeValue::S("lead".to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await?;

            items.extend(result.items().iter().cloned());

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl DispatchStore for DynamoStore {
    async fn insert_lead(&self, lead: &Lead) -> Result<()> {
        self.put_new(lead_to_item(lead), "Lead").await
    }

    async fn get_lead(&self, lead_id: &str) -> Result<Option<Lead>> {
        self.get_by_key(format!("LEAD#{}", lead_id))
            .await?
            .map(|item| item_to_lead(&item))
            .transpose()
    }

    async fn list_team_leads(&self, team_id: &str) -> Result<Vec<Lead>> {
        self.query_prefix(Some(GSI1), format!("TEAM#{}", team_id), "LEAD#")
            .await?
            .iter()
            .map(item_to_lead)
            .collect()
    }

    async fn list_all_leads(&self) -> Result<Vec<Lead>> {
        self.scan_leads().await?.iter().map(item_to_lead).collect()
    }

    async fn update_lead(&self, update: &LeadUpdate) -> Result<Lead> {
        let pk = format!("LEAD#{}", update.lead_id);

        let mut sets = vec!["updated_at = :updated_at".to_string()];
        let mut values: Item = HashMap::new();
        values.insert(":updated_at".to_string(), AttributeValue::S(update.updated_at.to_rfc3339()));

        if let Some(status) = update.status {
            sets.push("#status = :status".to_string());
            values.insert(":status".to_string(), AttributeValue::S(status.as_str().to_string()));
        }
        if let Some((closer_id, closer_name)) = &update.assigned_closer {
            sets.push("assigned_closer_id = :closer_id".to_string());
            sets.push("assigned_closer_name = :closer_name".to_string());
            values.insert(":closer_id".to_string(), AttributeValue::S(closer_id.clone()));
            values.insert(":closer_name".to_string(), AttributeValue::S(closer_name.clone()));
        }
        if let Some(at) = update.scheduled_appointment_time {
            sets.push("scheduled_appointment_time = :appointment".to_string());
            values.insert(":appointment".to_string(), AttributeValue::S(at.to_rfc3339()));
        }
        if let Some(verified) = update.setter_verified {
            sets.push("setter_verified = :verified".to_string());
            values.insert(":verified".to_string(), AttributeValue::Bool(verified));
        }
        if let Some(notes) = &update.disposition_notes {
            sets.push("disposition_notes = :notes".to_string());
            values.insert(":notes".to_string(), AttributeValue::S(notes.clone()));
        }
        if !update.append_photo_urls.is_empty() {
            sets.push("photo_urls = list_append(if_not_exists(photo_urls, :empty_list), :photos)".to_string());
            values.insert(":empty_list".to_string(), AttributeValue::L(vec![]));
            values.insert(
                ":photos".to_string(),
                AttributeValue::L(
                    update
                        .append_photo_urls
                        .iter()
                        .map(|url| AttributeValue::S(url.clone()))
                        .collect(),
                ),
            );
        }

        let condition = update_condition(&update.expected_status, update.require_unassigned, &mut values);

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .update_expression(format!("SET {}", sets.join(", ")))
            .condition_expression(condition)
            .expression_attribute_names("#status", "status")
            .set_expression_attribute_values(Some(values))
            .return_values(ReturnValue::AllNew)
            .return_values_on_condition_check_failure(ReturnValuesOnConditionCheckFailure::AllOld)
            .send()
            .await;

        match result {
            Ok(output) => match output.attributes() {
                Some(item) => item_to_lead(item),
                None => Err(DispatchError::Internal("update_item returned no attributes".to_string())),
            },
            Err(e) => match e.into_service_error() {
                UpdateItemError::ConditionalCheckFailedException(failed) => match failed.item() {
                    Some(current) if !current.is_empty() => {
                        let status = get_s(current, "status").unwrap_or_default();
                        if update.require_unassigned && current.contains_key("assigned_closer_id") {
                            Err(DispatchError::Conflict("Lead was already accepted".to_string()))
                        } else {
                            Err(DispatchError::Conflict(format!("Lead is now {}", status)))
                        }
                    }
                    _ => Err(DispatchError::NotFound("Lead not found".to_string())),
                },
                other => Err(DispatchError::Internal(format!("DynamoDB update_item error: {:?}", other))),
            },
        }
    }

    async fn append_activity(&self, entry: &ActivityEntry) -> Result<()> {
        self.put(activity_to_item(entry)).await
    }

    async fn list_activity(&self, lead_id: &str) -> Result<Vec<ActivityEntry>> {
        self.query_prefix(None, format!("LEAD#{}", lead_id), "ACTIVITY#")
            .await?
            .iter()
            .map(item_to_activity)
            .collect()
    }

    async fn insert_user(&self, user: &AppUser) -> Result<()> {
        self.put_new(user_to_item(user), "User profile").await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<AppUser>> {
        self.get_by_key(format!("USER#{}", user_id))
            .await?
            .map(|item| item_to_user(&item))
            .transpose()
    }

    async fn save_user(&self, user: &AppUser) -> Result<()> {
        self.put(user_to_item(user)).await
    }

    async fn list_team_users(&self, team_id: &str) -> Result<Vec<AppUser>> {
        self.query_prefix(Some(GSI1), format!("TEAM#{}", team_id), "USER#")
            .await?
            .iter()
            .map(item_to_user)
            .collect()
    }

    async fn put_pending_approval(&self, pending: &PendingApproval) -> Result<()> {
        let mut item = HashMap::new();
        item.insert("PK".to_string(), AttributeValue::S(PENDING_APPROVAL_PK.to_string()));
        item.insert("SK".to_string(), AttributeValue::S(format!("USER#{}", pending.user_id)));
        item.insert("entity_type".to_string(), AttributeValue::S("pending_approval".to_string()));
        item.insert("user_id".to_string(), AttributeValue::S(pending.user_id.clone()));
        item.insert("requested_role".to_string(), AttributeValue::S(pending.requested_role.as_str().to_string()));
        item.insert("requested_at".to_string(), AttributeValue::S(pending.requested_at.to_rfc3339()));
        if let Some(team_id) = &pending.team_id {
            item.insert("team_id".to_string(), AttributeValue::S(team_id.clone()));
        }
        self.put(item).await
    }

    async fn remove_pending_approval(&self, user_id: &str) -> Result<()> {
        self.delete(PENDING_APPROVAL_PK.to_string(), format!("USER#{}", user_id)).await
    }

    async fn list_pending_approvals(&self) -> Result<Vec<PendingApproval>> {
        let items = self
            .query_prefix(None, PENDING_APPROVAL_PK.to_string(), "USER#")
            .await?;

        let mut pending = Vec::new();
        for item in &items {
            pending.push(PendingApproval {
                user_id: req_s(item, "user_id")?,
                team_id: get_s(item, "team_id"),
                requested_role: parse_field(item, "requested_role", Role::parse)?,
                requested_at: req_utc(item, "requested_at")?,
            });
        }
        pending.sort_by_key(|p| p.requested_at);
        Ok(pending)
    }

    async fn insert_team(&self, team: &Team) -> Result<()> {
        let pk = format!("TEAM#{}", team.team_id);
        let mut item = HashMap::new();
        item.insert("PK".to_string(), AttributeValue::S(pk.clone()));
        item.insert("SK".to_string(), AttributeValue::S(pk.clone()));
        item.insert("GSI1PK".to_string(), AttributeValue::S(TEAMS_PK.to_string()));
        item.insert("GSI1SK".to_string(), AttributeValue::S(pk));
        item.insert("entity_type".to_string(), AttributeValue::S("team".to_string()));
        item.insert("team_id".to_string(), AttributeValue::S(team.team_id.clone()));
        item.insert("name".to_string(), AttributeValue::S(team.name.clone()));
        item.insert("region_id".to_string(), AttributeValue::S(team.region_id.clone()));
        item.insert(
            "utc_offset_minutes".to_string(),
            AttributeValue::N(team.utc_offset_minutes.to_string()),
        );
        self.put_new(item, "Team").await
    }

    async fn get_team(&self, team_id: &str) -> Result<Option<Team>> {
        self.get_by_key(format!("TEAM#{}", team_id))
            .await?
            .map(|item| item_to_team(&item))
            .transpose()
    }

    async fn list_teams(&self) -> Result<Vec<Team>> {
        let mut teams = self
            .query_prefix(Some(GSI1), TEAMS_PK.to_string(), "TEAM#")
            .await?
            .iter()
            .map(item_to_team)
            .collect::<Result<Vec<_>>>()?;
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }

    async fn save_connection(&self, connection: &Connection) -> Result<()> {
        let pk = format!("CONNECTION#{}", connection.connection_id);
        let mut item = HashMap::new();
        item.insert("PK".to_string(), AttributeValue::S(pk.clone()));
        item.insert("SK".to_string(), AttributeValue::S(pk.clone()));
        item.insert("entity_type".to_string(), AttributeValue::S("connection".to_string()));
        item.insert("connection_id".to_string(), AttributeValue::S(connection.connection_id.clone()));
        item.insert("user_id".to_string(), AttributeValue::S(connection.user_id.clone()));
        item.insert("connected_at".to_string(), AttributeValue::S(connection.connected_at.to_rfc3339()));
        if let Some(team_id) = &connection.team_id {
            item.insert("team_id".to_string(), AttributeValue::S(team_id.clone()));
            item.insert("GSI1PK".to_string(), AttributeValue::S(format!("TEAM#{}", team_id)));
            item.insert("GSI1SK".to_string(), AttributeValue::S(pk));
        }
        self.put(item).await?;

        tracing::info!("Connection saved: {} (user: {})", connection.connection_id, connection.user_id);
        Ok(())
    }

    async fn remove_connection(&self, connection_id: &str) -> Result<()> {
        let pk = format!("CONNECTION#{}", connection_id);
        self.delete(pk.clone(), pk).await?;

        tracing::info!("Connection removed: {}", connection_id);
        Ok(())
    }

    async fn list_team_connections(&self, team_id: &str) -> Result<Vec<Connection>> {
        let items = self
            .query_prefix(Some(GSI1), format!("TEAM#{}", team_id), "CONNECTION#")
            .await?;

        let mut connections = Vec::new();
        for item in &items {
            connections.push(Connection {
                connection_id: req_s(item, "connection_id")?,
                user_id: req_s(item, "user_id")?,
                team_id: get_s(item, "team_id"),
                connected_at: req_utc(item, "connected_at")?,
            });
        }
        Ok(connections)
    }
}

/// Condition for a `LeadUpdate`: the item exists and its stored status is one
/// of `expected`. Legacy `in_process` items match an expected `accepted`.
fn update_condition(expected: &[LeadStatus], require_unassigned: bool, values: &mut Item) -> String {
    let mut stored: Vec<&str> = expected.iter().map(|status| status.as_str()).collect();
    if expected.contains(&LeadStatus::Accepted) {
        stored.push(LEGACY_ACCEPTED);
    }

    let mut placeholders = Vec::new();
    for (i, status) in stored.into_iter().enumerate() {
        let key = format!(":expected{}", i);
        values.insert(key.clone(), AttributeValue::S(status.to_string()));
        placeholders.push(key);
    }

    let mut condition = format!("attribute_exists(PK) AND #status IN ({})", placeholders.join(", "));
    if require_unassigned {
        condition.push_str(" AND attribute_not_exists(assigned_closer_id)");
    }
    condition
}

// ========== STREAM IMAGES ==========

/// Convert an item in DynamoDB JSON (`{"status": {"S": "scheduled"}}`), as
/// found in stream records, into SDK attribute values.
pub fn item_from_json(value: &serde_json::Value) -> Result<Item> {
    let object = value
        .as_object()
        .ok_or_else(|| DispatchError::InvalidArgument("Stream image is not an object".to_string()))?;
    object
        .iter()
        .map(|(key, attr)| attribute_from_json(attr).map(|a| (key.clone(), a)))
        .collect()
}

fn attribute_from_json(value: &serde_json::Value) -> Result<AttributeValue> {
    let malformed = || DispatchError::InvalidArgument(format!("Unsupported attribute value: {}", value));
    let (tag, inner) = value
        .as_object()
        .and_then(|o| o.iter().next())
        .ok_or_else(malformed)?;

    let attribute = match tag.as_str() {
        "S" => AttributeValue::S(inner.as_str().ok_or_else(malformed)?.to_string()),
        "N" => AttributeValue::N(match inner {
            serde_json::Value::String(n) => n.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return Err(malformed()),
        }),
        "BOOL" | "Bool" => AttributeValue::Bool(inner.as_bool().ok_or_else(malformed)?),
        "NULL" | "Null" => AttributeValue::Null(true),
        "SS" | "Ss" => AttributeValue::Ss(
            inner
                .as_array()
                .ok_or_else(malformed)?
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
        ),
        "L" => AttributeValue::L(
            inner
                .as_array()
                .ok_or_else(malformed)?
                .iter()
                .map(attribute_from_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        "M" => AttributeValue::M(item_from_json(inner)?),
        _ => return Err(malformed()),
    };
    Ok(attribute)
}

// ========== ITEM MAPPING ==========

fn get_s(item: &Item, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).map(|s| s.to_string())
}

fn req_s(item: &Item, key: &str) -> Result<String> {
    get_s(item, key).ok_or_else(|| DispatchError::Internal(format!("Malformed item: missing '{}'", key)))
}

fn get_bool(item: &Item, key: &str) -> bool {
    item.get(key).and_then(|v| v.as_bool().ok()).copied().unwrap_or(false)
}

fn req_utc(item: &Item, key: &str) -> Result<DateTime<Utc>> {
    let raw = req_s(item, key)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| DispatchError::Internal(format!("Malformed item: bad timestamp in '{}'", key)))
}

fn get_offset_time(item: &Item, key: &str) -> Result<Option<DateTime<FixedOffset>>> {
    match get_s(item, key) {
        Some(raw) if !raw.is_empty() => DateTime::parse_from_rfc3339(&raw)
            .map(Some)
            .map_err(|_| DispatchError::Internal(format!("Malformed item: bad timestamp in '{}'", key))),
        _ => Ok(None),
    }
}

fn parse_field<T>(item: &Item, key: &str, parse: fn(&str) -> Option<T>) -> Result<T> {
    let raw = req_s(item, key)?;
    parse(&raw).ok_or_else(|| DispatchError::Internal(format!("Malformed item: unknown {} '{}'", key, raw)))
}

fn lead_to_item(lead: &Lead) -> Item {
    let pk = format!("LEAD#{}", lead.lead_id);
    let mut item = HashMap::new();
    item.insert("PK".to_string(), AttributeValue::S(pk.clone()));
    item.insert("SK".to_string(), AttributeValue::S(pk));
    item.insert("GSI1PK".to_string(), AttributeValue::S(format!("TEAM#{}", lead.team_id)));
    item.insert("GSI1SK".to_string(), AttributeValue::S(format!("LEAD#{}", lead.created_at.to_rfc3339())));
    item.insert("entity_type".to_string(), AttributeValue::S("lead".to_string()));
    item.insert("lead_id".to_string(), AttributeValue::S(lead.lead_id.clone()));
    item.insert("customer_name".to_string(), AttributeValue::S(lead.customer_name.clone()));
    item.insert("customer_phone".to_string(), AttributeValue::S(lead.customer_phone.clone()));
    item.insert("address".to_string(), AttributeValue::S(lead.address.clone()));
    item.insert("status".to_string(), AttributeValue::S(lead.status.as_str().to_string()));
    item.insert("dispatch_type".to_string(), AttributeValue::S(lead.dispatch_type.as_str().to_string()));
    item.insert("team_id".to_string(), AttributeValue::S(lead.team_id.clone()));
    item.insert("setter_verified".to_string(), AttributeValue::Bool(lead.setter_verified));
    item.insert("disposition_notes".to_string(), AttributeValue::S(lead.disposition_notes.clone()));
    item.insert(
        "photo_urls".to_string(),
        AttributeValue::L(lead.photo_urls.iter().map(|u| AttributeValue::S(u.clone())).collect()),
    );
    item.insert("created_at".to_string(), AttributeValue::S(lead.created_at.to_rfc3339()));
    item.insert("updated_at".to_string(), AttributeValue::S(lead.updated_at.to_rfc3339()));

    let optional = [
        ("setter_id", &lead.setter_id),
        ("setter_name", &lead.setter_name),
        ("assigned_closer_id", &lead.assigned_closer_id),
        ("assigned_closer_name", &lead.assigned_closer_name),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            item.insert(key.to_string(), AttributeValue::S(value.clone()));
        }
    }
    if let Some(at) = lead.scheduled_appointment_time {
        item.insert("scheduled_appointment_time".to_string(), AttributeValue::S(at.to_rfc3339()));
    }
    item
}

pub fn item_to_lead(item: &Item) -> Result<Lead> {
    let photo_urls = item
        .get("photo_urls")
        .and_then(|v| v.as_l().ok())
        .map(|list| {
            list.iter()
                .filter_map(|v| v.as_s().ok())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();

    Ok(Lead {
        lead_id: req_s(item, "lead_id")?,
        customer_name: get_s(item, "customer_name").unwrap_or_default(),
        customer_phone: get_s(item, "customer_phone").unwrap_or_default(),
        address: get_s(item, "address").unwrap_or_default(),
        status: parse_field(item, "status", LeadStatus::parse)?,
        dispatch_type: parse_field(item, "dispatch_type", DispatchType::parse)?,
        team_id: req_s(item, "team_id")?,
        setter_id: get_s(item, "setter_id"),
        setter_name: get_s(item, "setter_name"),
        assigned_closer_id: get_s(item, "assigned_closer_id"),
        assigned_closer_name: get_s(item, "assigned_closer_name"),
        scheduled_appointment_time: get_offset_time(item, "scheduled_appointment_time")?,
        setter_verified: get_bool(item, "setter_verified"),
        disposition_notes: get_s(item, "disposition_notes").unwrap_or_default(),
        photo_urls,
        created_at: req_utc(item, "created_at")?,
        updated_at: req_utc(item, "updated_at")?,
    })
}

fn activity_to_item(entry: &ActivityEntry) -> Item {
    let mut item = HashMap::new();
    item.insert("PK".to_string(), AttributeValue::S(format!("LEAD#{}", entry.lead_id)));
    item.insert(
        "SK".to_string(),
        AttributeValue::S(format!("ACTIVITY#{}#{}", entry.at.to_rfc3339(), uuid::Uuid::new_v4())),
    );
    item.insert("entity_type".to_string(), AttributeValue::S("activity".to_string()));
    item.insert("lead_id".to_string(), AttributeValue::S(entry.lead_id.clone()));
    item.insert("action".to_string(), AttributeValue::S(entry.action.as_str().to_string()));
    item.insert("actor_id".to_string(), AttributeValue::S(entry.actor_id.clone()));
    item.insert("actor_name".to_string(), AttributeValue::S(entry.actor_name.clone()));
    item.insert("to_status".to_string(), AttributeValue::S(entry.to_status.as_str().to_string()));
    item.insert("at".to_string(), AttributeValue::S(entry.at.to_rfc3339()));
    if let Some(assignee) = &entry.assignee_id {
        item.insert("assignee_id".to_string(), AttributeValue::S(assignee.clone()));
    }
    if let Some(from) = entry.from_status {
        item.insert("from_status".to_string(), AttributeValue::S(from.as_str().to_string()));
    }
    item
}

fn item_to_activity(item: &Item) -> Result<ActivityEntry> {
    Ok(ActivityEntry {
        lead_id: req_s(item, "lead_id")?,
        action: parse_field(item, "action", ActivityAction::parse)?,
        actor_id: req_s(item, "actor_id")?,
        actor_name: get_s(item, "actor_name").unwrap_or_default(),
        assignee_id: get_s(item, "assignee_id"),
        from_status: get_s(item, "from_status").and_then(|s| LeadStatus::parse(&s)),
        to_status: parse_field(item, "to_status", LeadStatus::parse)?,
        at: req_utc(item, "at")?,
    })
}

fn user_to_item(user: &AppUser) -> Item {
    let pk = format!("USER#{}", user.user_id);
    let mut item = HashMap::new();
    item.insert("PK".to_string(), AttributeValue::S(pk.clone()));
    item.insert("SK".to_string(), AttributeValue::S(pk.clone()));
    item.insert("entity_type".to_string(), AttributeValue::S("user".to_string()));
    item.insert("user_id".to_string(), AttributeValue::S(user.user_id.clone()));
    item.insert("name".to_string(), AttributeValue::S(user.name.clone()));
    item.insert("email".to_string(), AttributeValue::S(user.email.clone()));
    item.insert("role".to_string(), AttributeValue::S(user.role.as_str().to_string()));
    item.insert("status".to_string(), AttributeValue::S(user.status.as_str().to_string()));
    item.insert("created_at".to_string(), AttributeValue::S(user.created_at.to_rfc3339()));
    if let Some(team_id) = &user.team_id {
        item.insert("team_id".to_string(), AttributeValue::S(team_id.clone()));
        item.insert("GSI1PK".to_string(), AttributeValue::S(format!("TEAM#{}", team_id)));
        item.insert("GSI1SK".to_string(), AttributeValue::S(pk));
    }
    item
}

fn item_to_user(item: &Item) -> Result<AppUser> {
    Ok(AppUser {
        user_id: req_s(item, "user_id")?,
        name: get_s(item, "name").unwrap_or_default(),
        email: get_s(item, "email").unwrap_or_default(),
        role: parse_field(item, "role", Role::parse)?,
        team_id: get_s(item, "team_id"),
        status: parse_field(item, "status", UserStatus::parse)?,
        created_at: req_utc(item, "created_at")?,
    })
}

fn item_to_team(item: &Item) -> Result<Team> {
    Ok(Team {
        team_id: req_s(item, "team_id")?,
        name: get_s(item, "name").unwrap_or_default(),
        region_id: get_s(item, "region_id").unwrap_or_default(),
        utc_offset_minutes: item
            .get("utc_offset_minutes")
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lead() -> Lead {
        let now = Utc::now();
        Lead {
            lead_id: "lead-1".to_string(),
            customer_name: "Dana".to_string(),
            customer_phone: "555-0100".to_string(),
            address: "1 Main St".to_string(),
            status: LeadStatus::Rescheduled,
            dispatch_type: DispatchType::Scheduled,
            team_id: "team-a".to_string(),
            setter_id: Some("setter-1".to_string()),
            setter_name: Some("Sam".to_string()),
            assigned_closer_id: None,
            assigned_closer_name: None,
            scheduled_appointment_time: Some(
                DateTime::parse_from_rfc3339("2025-07-10T21:00:00-07:00").unwrap(),
            ),
            setter_verified: false,
            disposition_notes: String::new(),
            photo_urls: vec!["https://photos/a.jpg".to_string()],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_lead_item_keys() {
        let item = lead_to_item(&sample_lead());
        assert_eq!(get_s(&item, "PK").as_deref(), Some("LEAD#lead-1"));
        assert_eq!(get_s(&item, "GSI1PK").as_deref(), Some("TEAM#team-a"));
        assert_eq!(get_s(&item, "entity_type").as_deref(), Some("lead"));
        assert!(!item.contains_key("assigned_closer_id"));
        assert_eq!(
            get_s(&item, "scheduled_appointment_time").as_deref(),
            Some("2025-07-10T21:00:00-07:00")
        );
    }

    #[test]
    fn test_lead_item_preserves_offset() {
        let lead = sample_lead();
        let back = item_to_lead(&lead_to_item(&lead)).unwrap();
        assert_eq!(back.scheduled_appointment_time, lead.scheduled_appointment_time);
        assert_eq!(
            back.scheduled_appointment_time.unwrap().offset().local_minus_utc(),
            -7 * 3600
        );
        assert_eq!(back.photo_urls, lead.photo_urls);
    }

    #[test]
    fn test_legacy_in_process_status_reads_as_accepted() {
        let mut item = lead_to_item(&sample_lead());
        item.insert("status".to_string(), AttributeValue::S("in_process".to_string()));
        assert_eq!(item_to_lead(&item).unwrap().status, LeadStatus::Accepted);
    }

    #[test]
    fn test_update_condition_matches_legacy_accepted() {
        let mut values = HashMap::new();
        let condition = update_condition(&[LeadStatus::Accepted, LeadStatus::Scheduled], false, &mut values);
        assert_eq!(
            condition,
            "attribute_exists(PK) AND #status IN (:expected0, :expected1, :expected2)"
        );
        assert_eq!(get_s(&values, ":expected0").as_deref(), Some("accepted"));
        assert_eq!(get_s(&values, ":expected1").as_deref(), Some("scheduled"));
        assert_eq!(get_s(&values, ":expected2").as_deref(), Some("in_process"));
    }

    #[test]
    fn test_update_condition_for_accept() {
        let mut values = HashMap::new();
        let condition = update_condition(&[LeadStatus::WaitingAssignment], true, &mut values);
        assert_eq!(
            condition,
            "attribute_exists(PK) AND #status IN (:expected0) AND attribute_not_exists(assigned_closer_id)"
        );
        assert_eq!(values.len(), 1);
        assert!(!values.values().filter_map(|v| v.as_s().ok()).any(|s| s == "in_process"));
    }

    #[test]
    fn test_stream_image_to_lead() {
        let image = serde_json::json!({
            "PK": {"S": "LEAD#lead-9"},
            "lead_id": {"S": "lead-9"},
            "status": {"S": "scheduled"},
            "dispatch_type": {"S": "scheduled"},
            "team_id": {"S": "team-a"},
            "setter_verified": {"BOOL": true},
            "photo_urls": {"L": [{"S": "https://photos/a.jpg"}]},
            "scheduled_appointment_time": {"S": "2025-07-10T21:00:00-07:00"},
            "created_at": {"S": "2025-07-01T10:00:00+00:00"},
            "updated_at": {"S": "2025-07-01T10:00:00+00:00"},
            "version": {"N": "3"}
        });
        let lead = item_to_lead(&item_from_json(&image).unwrap()).unwrap();
        assert_eq!(lead.lead_id, "lead-9");
        assert_eq!(lead.status, LeadStatus::Scheduled);
        assert!(lead.setter_verified);
        assert_eq!(lead.photo_urls, vec!["https://photos/a.jpg".to_string()]);
        assert!(lead.assigned_closer_id.is_none());
    }

    #[test]
    fn test_stream_image_rejects_unknown_tags() {
        assert!(item_from_json(&serde_json::json!({"x": {"Q": 1}})).is_err());
        assert!(item_from_json(&serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_unknown_status_is_internal_error() {
        let mut item = lead_to_item(&sample_lead());
        item.insert("status".to_string(), AttributeValue::S("archived".to_string()));
        assert!(matches!(item_to_lead(&item), Err(DispatchError::Internal(_))));
    }
}
