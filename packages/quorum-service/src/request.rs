use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{Error, QuorumService, Result, realtime, rfc3339};

const INSERT_REQUEST_SQL: &str = "\
INSERT INTO access_requests (
	requester_id,
	owner_id,
	chunk_id,
	conversation_id,
	question,
	status,
	created_at
)
VALUES ($1, $2, $3, $4, $5, 'pending', $6)
RETURNING request_id";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateAccessRequest {
	pub user_id: String,
	pub chunk_id: i64,
	pub question: String,
	pub conversation_id: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessRequestCreated {
	pub request_id: i64,
}

#[derive(FromRow)]
struct ChunkOwnerRow {
	owner_id: String,
	content: String,
}

impl QuorumService {
	/// Opens a pending access request against someone else's chunk.
	/// Precondition order is fixed; the first failure wins.
	pub async fn create_request(
		&self,
		req: CreateAccessRequest,
	) -> Result<AccessRequestCreated> {
		let requester_id = req.user_id.trim();

		if requester_id.is_empty() {
			return Err(Error::InvalidRequest { message: "user_id is required.".to_string() });
		}

		let question = req.question.trim();

		if question.is_empty() {
			return Err(Error::InvalidRequest {
				message: "question must be non-empty.".to_string(),
			});
		}

		let chunk: ChunkOwnerRow = sqlx::query_as(
			"SELECT owner_id, content FROM knowledge_chunks WHERE chunk_id = $1",
		)
		.bind(req.chunk_id)
		.fetch_optional(&self.db.pool)
		.await?
		.ok_or_else(|| Error::NotFound { message: "Knowledge source not found.".to_string() })?;

		if chunk.owner_id == requester_id {
			return Err(Error::InvalidRequest {
				message: "Cannot request your own knowledge.".to_string(),
			});
		}

		let already_shared: Option<i64> = sqlx::query_scalar(
			"SELECT grant_id FROM grants WHERE chunk_id = $1 AND granted_to_user_id = $2",
		)
		.bind(req.chunk_id)
		.bind(requester_id)
		.fetch_optional(&self.db.pool)
		.await?;

		if already_shared.is_some() {
			return Err(Error::Conflict {
				message: "This knowledge is already shared with you.".to_string(),
			});
		}

		let pending: Option<i64> = sqlx::query_scalar(
			"\
SELECT request_id
FROM access_requests
WHERE chunk_id = $1 AND requester_id = $2 AND status = 'pending'",
		)
		.bind(req.chunk_id)
		.bind(requester_id)
		.fetch_optional(&self.db.pool)
		.await?;

		if pending.is_some() {
			return Err(Error::Conflict {
				message: "You already have a pending request for this knowledge.".to_string(),
			});
		}

		if let Some(conversation_id) = req.conversation_id {
			let owned: Option<i64> = sqlx::query_scalar(
				"SELECT conversation_id FROM conversations WHERE conversation_id = $1 AND user_id = $2",
			)
			.bind(conversation_id)
			.bind(requester_id)
			.fetch_optional(&self.db.pool)
			.await?;

			if owned.is_none() {
				return Err(Error::InvalidRequest {
					message: "conversation_id does not reference one of your conversations."
						.to_string(),
				});
			}
		}

		let now = time::OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		// The partial unique index backstops the pending check above; two
		// racing creates collapse into one Conflict instead of two rows.
		let request_id: i64 = match sqlx::query_scalar(INSERT_REQUEST_SQL)
			.bind(requester_id)
			.bind(chunk.owner_id.as_str())
			.bind(req.chunk_id)
			.bind(req.conversation_id)
			.bind(question)
			.bind(now)
			.fetch_one(&mut *tx)
			.await
		{
			Ok(request_id) => request_id,
			Err(sqlx::Error::Database(db_err))
				if db_err.constraint() == Some("access_requests_pending_uniq") =>
				return Err(Error::Conflict {
					message: "You already have a pending request for this knowledge."
						.to_string(),
				}),
			Err(err) => return Err(err.into()),
		};
		let payload = serde_json::json!({
			"request_id": request_id,
			"requester_id": requester_id,
			"chunk_id": req.chunk_id,
			"question": question,
			"chunk_content": chunk.content,
		});

		sqlx::query(
			"INSERT INTO notifications (user_id, kind, payload, created_at) VALUES ($1, 'request_created', $2, $3)",
		)
		.bind(chunk.owner_id.as_str())
		.bind(&payload)
		.bind(now)
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;

		let requester = self.member_display(requester_id).await;
		let event = serde_json::json!({
			"type": realtime::EVENT_REQUEST_CREATED,
			"request_id": request_id,
			"question": question,
			"requester_name": requester.0,
			"requester_email": requester.1,
			"created_at": rfc3339(now),
		});

		self.push_to_user(&chunk.owner_id, realtime::EVENT_REQUEST_CREATED, &event).await;

		Ok(AccessRequestCreated { request_id })
	}

	async fn member_display(&self, user_id: &str) -> (String, String) {
		let row: Option<(String, String)> =
			sqlx::query_as("SELECT name, email FROM members WHERE user_id = $1")
				.bind(user_id)
				.fetch_optional(&self.db.pool)
				.await
				.ok()
				.flatten();

		row.unwrap_or_default()
	}
}
