use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quorum_domain::chunking::split_chunks;

use crate::{Error, QuorumService, Result, vector_to_pg};

const TITLE_MAX_CHARS: usize = 50;
const INSERT_MESSAGE_CHUNK_SQL: &str = "\
INSERT INTO knowledge_chunks (
	owner_id,
	org_id,
	source_kind,
	message_id,
	chunk_index,
	content,
	vec,
	created_at
)
VALUES ($1, $2, 'message', $3, $4, $5, $6::text::vector, $7)";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
	User,
	Assistant,
	System,
}
impl MessageRole {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::User => "user",
			Self::Assistant => "assistant",
			Self::System => "system",
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestTurn {
	pub user_id: String,
	pub org_id: String,
	pub conversation_id: Option<i64>,
	pub role: MessageRole,
	pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestTurnResponse {
	pub conversation_id: i64,
	pub message_id: i64,
}

impl QuorumService {
	/// Persists one dialogue turn. User turns are chunked and embedded so
	/// they become searchable (and shareable) knowledge; the message and its
	/// chunks commit together — a turn the owner cannot be asked about is
	/// worse than a failed request.
	pub async fn ingest_turn(&self, req: IngestTurn) -> Result<IngestTurnResponse> {
		let user_id = req.user_id.trim();
		let org_id = req.org_id.trim();

		if user_id.is_empty() || org_id.is_empty() {
			return Err(Error::InvalidRequest {
				message: "user_id and org_id are required.".to_string(),
			});
		}

		let content = req.content.trim();

		if content.is_empty() {
			return Err(Error::InvalidRequest {
				message: "content must be non-empty.".to_string(),
			});
		}

		let chunks = if req.role == MessageRole::User { split_chunks(content) } else { Vec::new() };
		let vectors = if chunks.is_empty() {
			Vec::new()
		} else {
			self.embed_texts(&chunks).await?
		};
		let now = time::OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		let conversation_id = match req.conversation_id {
			Some(candidate) => {
				let owned: Option<i64> = sqlx::query_scalar(
					"SELECT conversation_id FROM conversations WHERE conversation_id = $1 AND user_id = $2",
				)
				.bind(candidate)
				.bind(user_id)
				.fetch_optional(&mut *tx)
				.await?;

				match owned {
					Some(conversation_id) => conversation_id,
					None => self.create_conversation(&mut tx, user_id, org_id, content).await?,
				}
			},
			None => self.create_conversation(&mut tx, user_id, org_id, content).await?,
		};
		let message_id: i64 = sqlx::query_scalar(
			"\
INSERT INTO messages (conversation_id, role, content, created_at)
VALUES ($1, $2, $3, $4)
RETURNING message_id",
		)
		.bind(conversation_id)
		.bind(req.role.as_str())
		.bind(content)
		.bind(now)
		.fetch_one(&mut *tx)
		.await?;

		for (index, (chunk, vec)) in chunks.iter().zip(&vectors).enumerate() {
			sqlx::query(INSERT_MESSAGE_CHUNK_SQL)
				.bind(user_id)
				.bind(org_id)
				.bind(message_id)
				.bind(index as i32)
				.bind(chunk.as_str())
				.bind(vector_to_pg(vec))
				.bind(now)
				.execute(&mut *tx)
				.await?;
		}

		tx.commit().await?;

		Ok(IngestTurnResponse { conversation_id, message_id })
	}

	async fn create_conversation(
		&self,
		tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
		user_id: &str,
		org_id: &str,
		first_message: &str,
	) -> Result<i64> {
		let mut title: String = first_message.chars().take(TITLE_MAX_CHARS).collect();

		if first_message.chars().count() > TITLE_MAX_CHARS {
			title.push_str("...");
		}

		let now = time::OffsetDateTime::now_utc();
		let conversation_id: i64 = sqlx::query_scalar(
			"\
INSERT INTO conversations (public_id, user_id, org_id, title, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $5)
RETURNING conversation_id",
		)
		.bind(Uuid::new_v4().to_string())
		.bind(user_id)
		.bind(org_id)
		.bind(title.as_str())
		.bind(now)
		.fetch_one(&mut **tx)
		.await?;

		Ok(conversation_id)
	}
}
