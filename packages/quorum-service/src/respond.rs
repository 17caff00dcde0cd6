use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use quorum_domain::request_state::{Decision, RequestStatus, transition};

use crate::{Error, QuorumService, Result, realtime, rfc3339};

const PENDING_LOOKUP_SQL: &str = "\
SELECT request_id, requester_id, owner_id, chunk_id, conversation_id, question, status
FROM access_requests
WHERE request_id = $1
	AND owner_id = $2
FOR UPDATE";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RespondRequest {
	pub user_id: String,
	pub request_id: i64,
	pub action: Decision,
	pub response_note: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RespondResponse {
	pub request_id: i64,
	pub status: RequestStatus,
}

#[derive(FromRow)]
struct PendingRow {
	request_id: i64,
	requester_id: String,
	chunk_id: i64,
	conversation_id: Option<i64>,
	question: String,
	status: String,
}

impl QuorumService {
	/// Resolves a pending request. Status flip, grant insert, and the
	/// requester's notification row commit as one transaction; a request can
	/// only ever be resolved once. Missing, foreign, and already-resolved
	/// requests are indistinguishable to the caller.
	pub async fn respond(&self, req: RespondRequest) -> Result<RespondResponse> {
		let owner_id = req.user_id.trim();

		if owner_id.is_empty() {
			return Err(Error::InvalidRequest { message: "user_id is required.".to_string() });
		}

		let not_found = || Error::NotFound {
			message: "Request not found or already processed.".to_string(),
		};
		let mut tx = self.db.pool.begin().await?;
		let row: PendingRow = sqlx::query_as(PENDING_LOOKUP_SQL)
			.bind(req.request_id)
			.bind(owner_id)
			.fetch_optional(&mut *tx)
			.await?
			.ok_or_else(not_found)?;
		let current = RequestStatus::parse(&row.status).ok_or_else(|| Error::Storage {
			message: format!("Unexpected request status {:?}.", row.status),
		})?;
		let Some(new_status) = transition(current, req.action) else {
			return Err(not_found());
		};
		let response_note = req
			.response_note
			.as_deref()
			.map(str::trim)
			.filter(|note| !note.is_empty())
			.map(ToString::to_string);
		let now = time::OffsetDateTime::now_utc();

		sqlx::query(
			"\
UPDATE access_requests
SET status = $1,
	response_note = $2,
	responded_at = $3
WHERE request_id = $4",
		)
		.bind(new_status.as_str())
		.bind(response_note.as_deref())
		.bind(now)
		.bind(row.request_id)
		.execute(&mut *tx)
		.await?;

		if new_status == RequestStatus::Approved {
			sqlx::query(
				"\
INSERT INTO grants (chunk_id, owner_id, granted_to_user_id, created_at)
VALUES ($1, $2, $3, $4)",
			)
			.bind(row.chunk_id)
			.bind(owner_id)
			.bind(row.requester_id.as_str())
			.bind(now)
			.execute(&mut *tx)
			.await?;
		}

		let kind = match new_status {
			RequestStatus::Approved => "request_approved",
			_ => "request_denied",
		};
		let payload = serde_json::json!({
			"request_id": row.request_id,
			"chunk_id": row.chunk_id,
			"response_note": response_note,
			"question": row.question,
			"conversation_id": row.conversation_id,
		});

		sqlx::query(
			"INSERT INTO notifications (user_id, kind, payload, created_at) VALUES ($1, $2, $3, $4)",
		)
		.bind(row.requester_id.as_str())
		.bind(kind)
		.bind(&payload)
		.bind(now)
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;

		// Carries the original question and conversation so the requester's
		// client can resume the stalled exchange without re-asking.
		let event = serde_json::json!({
			"type": realtime::EVENT_REQUEST_RESPONSE,
			"request_id": row.request_id,
			"status": new_status,
			"response_note": response_note,
			"responded_at": rfc3339(now),
			"question": row.question,
			"conversation_id": row.conversation_id,
		});

		self.push_to_user(&row.requester_id, realtime::EVENT_REQUEST_RESPONSE, &event).await;

		Ok(RespondResponse { request_id: row.request_id, status: new_status })
	}
}
