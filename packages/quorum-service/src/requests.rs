use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use quorum_domain::request_state::RequestStatus;

use crate::{Error, QuorumService, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
	#[default]
	Received,
	Sent,
	All,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListRequests {
	pub user_id: String,
	#[serde(default)]
	pub direction: Direction,
	pub status: Option<RequestStatus>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestParty {
	pub id: String,
	pub name: String,
	pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkPreview {
	pub chunk_id: i64,
	pub chunk_index: i32,
	pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParentMessage {
	pub content: String,
	pub role: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestItem {
	pub request_id: i64,
	pub question: String,
	pub status: RequestStatus,
	pub response_note: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde::option")]
	pub responded_at: Option<OffsetDateTime>,
	pub is_owner: bool,
	pub conversation_id: Option<i64>,
	pub chunk: ChunkPreview,
	pub parent_message: Option<ParentMessage>,
	pub requester: RequestParty,
	pub owner: RequestParty,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListRequestsResponse {
	pub requests: Vec<RequestItem>,
}

#[derive(FromRow)]
struct RequestRow {
	request_id: i64,
	requester_id: String,
	owner_id: String,
	chunk_id: i64,
	conversation_id: Option<i64>,
	question: String,
	status: String,
	response_note: Option<String>,
	created_at: OffsetDateTime,
	responded_at: Option<OffsetDateTime>,
	chunk_index: i32,
	chunk_content: String,
	parent_content: Option<String>,
	parent_role: Option<String>,
	requester_name: String,
	requester_email: String,
	owner_name: String,
	owner_email: String,
}

impl QuorumService {
	/// Lists requests the caller sent, received, or both, newest first, with
	/// enough joined context to render a decision card: who is asking, the
	/// chunk preview, and the message it was extracted from.
	pub async fn list_requests(&self, req: ListRequests) -> Result<ListRequestsResponse> {
		let user_id = req.user_id.trim();

		if user_id.is_empty() {
			return Err(Error::InvalidRequest { message: "user_id is required.".to_string() });
		}

		let mut builder = sqlx::QueryBuilder::new(
			"SELECT ar.request_id, ar.requester_id, ar.owner_id, ar.chunk_id, ar.conversation_id, \
			 ar.question, ar.status, ar.response_note, ar.created_at, ar.responded_at, \
			 c.chunk_index, c.content AS chunk_content, \
			 pm.content AS parent_content, pm.role AS parent_role, \
			 ru.name AS requester_name, ru.email AS requester_email, \
			 ou.name AS owner_name, ou.email AS owner_email \
			 FROM access_requests ar \
			 JOIN knowledge_chunks c ON c.chunk_id = ar.chunk_id \
			 LEFT JOIN messages pm ON pm.message_id = c.message_id \
			 JOIN members ru ON ru.user_id = ar.requester_id \
			 JOIN members ou ON ou.user_id = ar.owner_id \
			 WHERE ",
		);

		match req.direction {
			Direction::Received => {
				builder.push("ar.owner_id = ");
				builder.push_bind(user_id);
			},
			Direction::Sent => {
				builder.push("ar.requester_id = ");
				builder.push_bind(user_id);
			},
			Direction::All => {
				builder.push("(ar.owner_id = ");
				builder.push_bind(user_id);
				builder.push(" OR ar.requester_id = ");
				builder.push_bind(user_id);
				builder.push(")");
			},
		}

		if let Some(status) = req.status {
			builder.push(" AND ar.status = ");
			builder.push_bind(status.as_str());
		}

		builder.push(" ORDER BY ar.created_at DESC, ar.request_id DESC");

		let rows: Vec<RequestRow> = builder.build_query_as().fetch_all(&self.db.pool).await?;
		let mut requests = Vec::with_capacity(rows.len());

		for row in rows {
			let Some(status) = RequestStatus::parse(&row.status) else {
				continue;
			};
			let parent_message = match (row.parent_content, row.parent_role) {
				(Some(content), Some(role)) => Some(ParentMessage { content, role }),
				_ => None,
			};

			requests.push(RequestItem {
				request_id: row.request_id,
				question: row.question,
				status,
				response_note: row.response_note,
				created_at: row.created_at,
				responded_at: row.responded_at,
				is_owner: row.owner_id == user_id,
				conversation_id: row.conversation_id,
				chunk: ChunkPreview {
					chunk_id: row.chunk_id,
					chunk_index: row.chunk_index,
					content: row.chunk_content,
				},
				parent_message,
				requester: RequestParty {
					id: row.requester_id,
					name: row.requester_name,
					email: row.requester_email,
				},
				owner: RequestParty {
					id: row.owner_id,
					name: row.owner_name,
					email: row.owner_email,
				},
			});
		}

		Ok(ListRequestsResponse { requests })
	}
}
