use serde_json::Value;
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub struct Member {
	pub user_id: String,
	pub org_id: String,
	pub name: String,
	pub email: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Resource {
	pub resource_id: i64,
	pub org_id: String,
	pub owner_id: String,
	pub content: String,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
	pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Conversation {
	pub conversation_id: i64,
	pub public_id: String,
	pub user_id: String,
	pub org_id: Option<String>,
	pub title: String,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Message {
	pub message_id: i64,
	pub conversation_id: i64,
	pub role: String,
	pub content: String,
	pub created_at: OffsetDateTime,
}

/// Chunk row without its vector; the vector never leaves SQL (distance is
/// computed in the database).
#[derive(Debug, sqlx::FromRow)]
pub struct KnowledgeChunk {
	pub chunk_id: i64,
	pub owner_id: String,
	pub org_id: String,
	pub source_kind: String,
	pub resource_id: Option<i64>,
	pub message_id: Option<i64>,
	pub chunk_index: i32,
	pub content: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct AccessRequest {
	pub request_id: i64,
	pub requester_id: String,
	pub owner_id: String,
	pub chunk_id: i64,
	pub conversation_id: Option<i64>,
	pub question: String,
	pub status: String,
	pub response_note: Option<String>,
	pub created_at: OffsetDateTime,
	pub responded_at: Option<OffsetDateTime>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Grant {
	pub grant_id: i64,
	pub chunk_id: i64,
	pub owner_id: String,
	pub granted_to_user_id: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Notification {
	pub notification_id: i64,
	pub user_id: String,
	pub kind: String,
	pub payload: Value,
	pub read: bool,
	pub created_at: OffsetDateTime,
}
