use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{Error, QuorumService, Result, vector_to_pg};

const SOURCE_TIER_OWN_SQL: &str = "\
SELECT
	c.chunk_id,
	c.content,
	c.owner_id,
	m.name AS owner_name,
	(c.vec <=> $1::text::vector)::float8 AS distance
FROM knowledge_chunks c
JOIN members m ON m.user_id = c.owner_id
LEFT JOIN resources r ON r.resource_id = c.resource_id
WHERE c.org_id = $2
	AND c.owner_id = $3
	AND (c.resource_id IS NULL OR r.deleted_at IS NULL)
	AND (c.vec <=> $1::text::vector) > $4
	AND (c.vec <=> $1::text::vector) < $5
ORDER BY distance ASC, c.chunk_id ASC
LIMIT $6";
const SOURCE_TIER_SHARED_SQL: &str = "\
SELECT
	c.chunk_id,
	c.content,
	c.owner_id,
	m.name AS owner_name,
	(c.vec <=> $1::text::vector)::float8 AS distance
FROM knowledge_chunks c
JOIN grants g ON g.chunk_id = c.chunk_id AND g.granted_to_user_id = $3
JOIN members m ON m.user_id = c.owner_id
LEFT JOIN resources r ON r.resource_id = c.resource_id
WHERE c.org_id = $2
	AND (c.resource_id IS NULL OR r.deleted_at IS NULL)
	AND (c.vec <=> $1::text::vector) > $4
	AND (c.vec <=> $1::text::vector) < $5
ORDER BY distance ASC, c.chunk_id ASC
LIMIT $6";
// Identity columns only. Content never crosses this boundary until the owner
// has granted access.
const SUGGESTION_TIER_SQL: &str = "\
SELECT
	c.chunk_id,
	c.owner_id,
	m.name AS owner_name,
	(c.vec <=> $1::text::vector)::float8 AS distance
FROM knowledge_chunks c
JOIN members m ON m.user_id = c.owner_id
LEFT JOIN resources r ON r.resource_id = c.resource_id
WHERE c.org_id = $2
	AND c.owner_id <> $3
	AND (c.resource_id IS NULL OR r.deleted_at IS NULL)
	AND NOT EXISTS (
		SELECT 1
		FROM grants g
		WHERE g.chunk_id = c.chunk_id AND g.granted_to_user_id = $3
	)
	AND c.chunk_id <> ALL($4)
	AND (c.vec <=> $1::text::vector) > $5
	AND (c.vec <=> $1::text::vector) < $6
ORDER BY distance ASC, c.chunk_id ASC
LIMIT $7";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrieveRequest {
	pub user_id: String,
	pub org_id: String,
	pub question: String,
}

/// A chunk the requester is authorized to read, with its content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeSource {
	pub chunk_id: i64,
	pub content: String,
	pub owner_id: String,
	pub owner_name: String,
	pub distance: f64,
}

/// A person who may hold relevant knowledge. Content is withheld until the
/// owner approves an access request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeSuggestion {
	pub chunk_id: i64,
	pub owner_id: String,
	pub owner_name: String,
	pub distance: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrieveResponse {
	pub knowledge_sources: Vec<KnowledgeSource>,
	pub knowledge_source_suggestions: Vec<KnowledgeSuggestion>,
}

#[derive(FromRow)]
struct SourceRow {
	chunk_id: i64,
	content: String,
	owner_id: String,
	owner_name: String,
	distance: f64,
}

#[derive(FromRow)]
struct SuggestionRow {
	chunk_id: i64,
	owner_id: String,
	owner_name: String,
	distance: f64,
}

impl QuorumService {
	/// Three ordered similarity searches over one query vector: the
	/// requester's own chunks, chunks shared with them, then other members'
	/// chunks as people-suggestions. All-or-nothing: any tier or embedding
	/// failure fails the call.
	pub async fn retrieve(&self, req: RetrieveRequest) -> Result<RetrieveResponse> {
		let user_id = req.user_id.trim();
		let org_id = req.org_id.trim();

		if user_id.is_empty() || org_id.is_empty() {
			return Err(Error::InvalidRequest {
				message: "user_id and org_id are required.".to_string(),
			});
		}

		let question = req.question.trim();

		if question.is_empty() {
			return Ok(RetrieveResponse {
				knowledge_sources: Vec::new(),
				knowledge_source_suggestions: Vec::new(),
			});
		}

		let vectors = self.embed_texts(&[question.to_string()]).await?;
		let Some(query_vec) = vectors.into_iter().next() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};
		let vec_text = vector_to_pg(&query_vec);
		let band = self.distance_band();
		let source_limit = i64::from(self.cfg.retrieval.source_limit);

		// Own and shared are independent reads; run them concurrently.
		let own = sqlx::query_as::<_, SourceRow>(SOURCE_TIER_OWN_SQL)
			.bind(vec_text.as_str())
			.bind(org_id)
			.bind(user_id)
			.bind(band.lower_bound)
			.bind(band.upper_bound)
			.bind(source_limit)
			.fetch_all(&self.db.pool);
		let shared = sqlx::query_as::<_, SourceRow>(SOURCE_TIER_SHARED_SQL)
			.bind(vec_text.as_str())
			.bind(org_id)
			.bind(user_id)
			.bind(band.lower_bound)
			.bind(band.upper_bound)
			.bind(source_limit)
			.fetch_all(&self.db.pool);
		let (own, shared) = tokio::try_join!(own, shared)?;

		// The suggestion tier must not resurface anything already usable.
		let surfaced: Vec<i64> =
			own.iter().chain(shared.iter()).map(|row| row.chunk_id).collect();
		let suggestions = sqlx::query_as::<_, SuggestionRow>(SUGGESTION_TIER_SQL)
			.bind(vec_text.as_str())
			.bind(org_id)
			.bind(user_id)
			.bind(surfaced.as_slice())
			.bind(band.lower_bound)
			.bind(band.upper_bound)
			.bind(i64::from(self.cfg.retrieval.suggestion_limit))
			.fetch_all(&self.db.pool)
			.await?;

		let knowledge_sources = own
			.into_iter()
			.chain(shared)
			.map(|row| KnowledgeSource {
				chunk_id: row.chunk_id,
				content: row.content,
				owner_id: row.owner_id,
				owner_name: row.owner_name,
				distance: row.distance,
			})
			.collect();
		let knowledge_source_suggestions = suggestions
			.into_iter()
			.map(|row| KnowledgeSuggestion {
				chunk_id: row.chunk_id,
				owner_id: row.owner_id,
				owner_name: row.owner_name,
				distance: row.distance,
			})
			.collect();

		Ok(RetrieveResponse { knowledge_sources, knowledge_source_suggestions })
	}
}
