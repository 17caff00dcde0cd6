use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use quorum_domain::chunking::split_chunks;

use crate::{Error, QuorumService, Result, vector_to_pg};

const INSERT_RESOURCE_CHUNK_SQL: &str = "\
INSERT INTO knowledge_chunks (
	owner_id,
	org_id,
	source_kind,
	resource_id,
	chunk_index,
	content,
	vec,
	created_at
)
VALUES ($1, $2, 'resource', $3, $4, $5, $6::text::vector, $7)";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateResource {
	pub user_id: String,
	pub org_id: String,
	pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateResource {
	pub user_id: String,
	pub org_id: String,
	pub resource_id: i64,
	pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteResource {
	pub user_id: String,
	pub org_id: String,
	pub resource_id: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurgeResource {
	pub user_id: String,
	pub org_id: String,
	pub resource_id: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceResponse {
	pub resource_id: i64,
	pub chunk_count: usize,
}

#[derive(FromRow)]
struct ResourceOwnerRow {
	owner_id: String,
	deleted_at: Option<time::OffsetDateTime>,
}

impl QuorumService {
	/// Creates an org knowledge-base resource and embeds its chunks in one
	/// provider call. Resource row and chunk rows commit together.
	pub async fn create_resource(&self, req: CreateResource) -> Result<ResourceResponse> {
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

		let chunks = split_chunks(content);
		let vectors = if chunks.is_empty() {
			Vec::new()
		} else {
			self.embed_texts(&chunks).await?
		};
		let now = time::OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		let resource_id: i64 = sqlx::query_scalar(
			"\
INSERT INTO resources (org_id, owner_id, content, created_at, updated_at)
VALUES ($1, $2, $3, $4, $4)
RETURNING resource_id",
		)
		.bind(org_id)
		.bind(user_id)
		.bind(content)
		.bind(now)
		.fetch_one(&mut *tx)
		.await?;

		for (index, (chunk, vec)) in chunks.iter().zip(&vectors).enumerate() {
			sqlx::query(INSERT_RESOURCE_CHUNK_SQL)
				.bind(user_id)
				.bind(org_id)
				.bind(resource_id)
				.bind(index as i32)
				.bind(chunk.as_str())
				.bind(vector_to_pg(vec))
				.bind(now)
				.execute(&mut *tx)
				.await?;
		}

		tx.commit().await?;

		Ok(ResourceResponse { resource_id, chunk_count: chunks.len() })
	}

	/// Replaces a resource's content. Old chunks are deleted and new ones
	/// inserted in the same transaction, so a search never observes a
	/// half-re-embedded resource.
	pub async fn update_resource(&self, req: UpdateResource) -> Result<ResourceResponse> {
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

		let mut tx = self.db.pool.begin().await?;
		let resource: ResourceOwnerRow = sqlx::query_as(
			"\
SELECT owner_id, deleted_at
FROM resources
WHERE resource_id = $1 AND org_id = $2
FOR UPDATE",
		)
		.bind(req.resource_id)
		.bind(org_id)
		.fetch_optional(&mut *tx)
		.await?
		.ok_or_else(|| Error::NotFound { message: "Resource not found.".to_string() })?;

		if resource.owner_id != user_id || resource.deleted_at.is_some() {
			return Err(Error::NotFound { message: "Resource not found.".to_string() });
		}

		let chunks = split_chunks(content);
		let vectors = if chunks.is_empty() {
			Vec::new()
		} else {
			self.embed_texts(&chunks).await?
		};
		let now = time::OffsetDateTime::now_utc();

		sqlx::query("UPDATE resources SET content = $1, updated_at = $2 WHERE resource_id = $3")
			.bind(content)
			.bind(now)
			.bind(req.resource_id)
			.execute(&mut *tx)
			.await?;
		sqlx::query("DELETE FROM knowledge_chunks WHERE resource_id = $1")
			.bind(req.resource_id)
			.execute(&mut *tx)
			.await?;

		for (index, (chunk, vec)) in chunks.iter().zip(&vectors).enumerate() {
			sqlx::query(INSERT_RESOURCE_CHUNK_SQL)
				.bind(user_id)
				.bind(org_id)
				.bind(req.resource_id)
				.bind(index as i32)
				.bind(chunk.as_str())
				.bind(vector_to_pg(vec))
				.bind(now)
				.execute(&mut *tx)
				.await?;
		}

		tx.commit().await?;

		Ok(ResourceResponse { resource_id: req.resource_id, chunk_count: chunks.len() })
	}

	/// Soft delete: the resource drops out of every search but stays on disk
	/// until purged.
	pub async fn delete_resource(&self, req: DeleteResource) -> Result<()> {
		let user_id = req.user_id.trim();
		let org_id = req.org_id.trim();

		if user_id.is_empty() || org_id.is_empty() {
			return Err(Error::InvalidRequest {
				message: "user_id and org_id are required.".to_string(),
			});
		}

		let now = time::OffsetDateTime::now_utc();
		let updated = sqlx::query(
			"\
UPDATE resources
SET deleted_at = $1,
	updated_at = $1
WHERE resource_id = $2
	AND org_id = $3
	AND owner_id = $4
	AND deleted_at IS NULL",
		)
		.bind(now)
		.bind(req.resource_id)
		.bind(org_id)
		.bind(user_id)
		.execute(&self.db.pool)
		.await?
		.rows_affected();

		if updated == 0 {
			return Err(Error::NotFound { message: "Resource not found.".to_string() });
		}

		Ok(())
	}

	/// Hard delete; chunks go with the resource via the cascade.
	pub async fn purge_resource(&self, req: PurgeResource) -> Result<()> {
		let user_id = req.user_id.trim();
		let org_id = req.org_id.trim();

		if user_id.is_empty() || org_id.is_empty() {
			return Err(Error::InvalidRequest {
				message: "user_id and org_id are required.".to_string(),
			});
		}

		let deleted = sqlx::query(
			"DELETE FROM resources WHERE resource_id = $1 AND org_id = $2 AND owner_id = $3",
		)
		.bind(req.resource_id)
		.bind(org_id)
		.bind(user_id)
		.execute(&self.db.pool)
		.await?
		.rows_affected();

		if deleted == 0 {
			return Err(Error::NotFound { message: "Resource not found.".to_string() });
		}

		Ok(())
	}
}
