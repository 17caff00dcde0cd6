use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use color_eyre::eyre;
use serde_json::{Map, Value};
use sqlx::PgPool;

use quorum_config::{
	Config, EmbeddingProviderConfig, Postgres, Providers as ProvidersConfig, Realtime, Retrieval,
	Security, Service, Storage,
};
use quorum_service::{BoxFuture, EmbeddingProvider, Providers, PushProvider, QuorumService};
use quorum_storage::db::Db;
use quorum_testkit::TestDatabase;

pub const VECTOR_DIM: u32 = 3;
pub const ORG: &str = "org-1";
pub const ALICE: &str = "user-alice";
pub const BOB: &str = "user-bob";

/// Unit query vector every test question maps to.
pub const QUERY_VEC: [f32; 3] = [1.0, 0.0, 0.0];
/// Cosine distance 0.2 from the query vector (3-4-5 triangle).
pub const NEAR_VEC: [f32; 3] = [4.0, 3.0, 0.0];

pub const QUESTION: &str = "What's our Q3 pricing?";
pub const BOB_KNOWLEDGE: &str = "Q3 pricing is tiered at 50k";

pub async fn setup() -> Option<(TestDatabase, PgPool)> {
	let Some(base_dsn) = quorum_testkit::env_dsn() else {
		eprintln!("Skipping acceptance tests; set QUORUM_PG_DSN to run.");

		return None;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = Db::connect(&Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 4 })
		.await
		.expect("Failed to connect to test database.");

	db.ensure_schema(VECTOR_DIM).await.expect("Failed to ensure schema.");

	let pool = db.pool.clone();

	Some((test_db, pool))
}

pub fn test_config(dsn: String) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		storage: Storage { postgres: Postgres { dsn, pool_max_conns: 4 } },
		providers: ProvidersConfig {
			embedding: EmbeddingProviderConfig {
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "test-model".to_string(),
				dimensions: VECTOR_DIM,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		realtime: Realtime {
			app_id: "1".to_string(),
			key: "app-key".to_string(),
			secret: "app-secret".to_string(),
			api_base: "http://127.0.0.1:1".to_string(),
			timeout_ms: 1_000,
		},
		retrieval: Retrieval {
			distance_lower_bound: 0.01,
			distance_upper_bound: 0.5,
			source_limit: 4,
			suggestion_limit: 2,
		},
		security: Security { bind_localhost_only: true, api_auth_token: None },
	}
}

pub fn service(pool: PgPool, cfg: Config, providers: Providers) -> QuorumService {
	QuorumService::with_providers(cfg, Db { pool }, providers)
}

/// Maps exact texts to fixed vectors; anything unknown lands orthogonal to
/// the query (distance 1, outside every test band).
pub struct MapEmbedding {
	vectors: HashMap<String, Vec<f32>>,
}
impl MapEmbedding {
	pub fn new(entries: &[(&str, [f32; 3])]) -> Self {
		let vectors = entries
			.iter()
			.map(|(text, vec)| (text.to_string(), vec.to_vec()))
			.collect();

		Self { vectors }
	}

	pub fn standard() -> Self {
		Self::new(&[
			(QUESTION, QUERY_VEC),
			(BOB_KNOWLEDGE, NEAR_VEC),
		])
	}
}
impl EmbeddingProvider for MapEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		let vectors = texts
			.iter()
			.map(|text| {
				self.vectors.get(text.as_str()).cloned().unwrap_or_else(|| vec![0.0, 0.0, 1.0])
			})
			.collect();

		Box::pin(async move { Ok(vectors) })
	}
}

pub struct FailEmbedding;
impl EmbeddingProvider for FailEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async { Err(eyre::eyre!("Embedding backend unavailable.")) })
	}
}

#[derive(Default)]
pub struct RecordingPush {
	pub events: Mutex<Vec<(String, String, Value)>>,
}
impl PushProvider for RecordingPush {
	fn trigger<'a>(
		&'a self,
		_cfg: &'a Realtime,
		channel: &'a str,
		event: &'a str,
		payload: &'a Value,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		self.events
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.push((channel.to_string(), event.to_string(), payload.clone()));

		Box::pin(async { Ok(()) })
	}
}

pub struct FailPush;
impl PushProvider for FailPush {
	fn trigger<'a>(
		&'a self,
		_cfg: &'a Realtime,
		_channel: &'a str,
		_event: &'a str,
		_payload: &'a Value,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async { Err(eyre::eyre!("Push gateway unavailable.")) })
	}
}

pub fn standard_providers() -> (Providers, Arc<RecordingPush>) {
	let push = Arc::new(RecordingPush::default());
	let providers = Providers::new(Arc::new(MapEmbedding::standard()), push.clone());

	(providers, push)
}

pub async fn seed_member(pool: &PgPool, user_id: &str, name: &str, email: &str) {
	sqlx::query("INSERT INTO members (user_id, org_id, name, email) VALUES ($1, $2, $3, $4)")
		.bind(user_id)
		.bind(ORG)
		.bind(name)
		.bind(email)
		.execute(pool)
		.await
		.expect("Failed to seed member.");
}

pub async fn seed_both_members(pool: &PgPool) {
	seed_member(pool, ALICE, "Alice", "alice@example.com").await;
	seed_member(pool, BOB, "Bob", "bob@example.com").await;
}

/// Ingests Bob's knowledge turn and returns the resulting chunk id.
pub async fn seed_bob_chunk(service: &QuorumService, pool: &PgPool) -> i64 {
	service
		.ingest_turn(quorum_service::IngestTurn {
			user_id: BOB.to_string(),
			org_id: ORG.to_string(),
			conversation_id: None,
			role: quorum_service::MessageRole::User,
			content: BOB_KNOWLEDGE.to_string(),
		})
		.await
		.expect("Failed to ingest Bob's turn.");

	sqlx::query_scalar::<_, i64>(
		"SELECT chunk_id FROM knowledge_chunks WHERE owner_id = $1 ORDER BY chunk_id LIMIT 1",
	)
	.bind(BOB)
	.fetch_one(pool)
	.await
	.expect("Failed to look up Bob's chunk.")
}
