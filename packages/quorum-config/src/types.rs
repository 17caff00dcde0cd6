use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub realtime: Realtime,
	pub retrieval: Retrieval,
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Pusher-compatible push gateway credentials.
#[derive(Debug, Deserialize)]
pub struct Realtime {
	pub app_id: String,
	pub key: String,
	pub secret: String,
	pub api_base: String,
	pub timeout_ms: u64,
}

/// Tunables for the tiered retriever. The distance band is an open interval:
/// the lower bound drops near-duplicates of the query, the upper bound drops
/// irrelevant matches. The right values depend on the embedding model.
#[derive(Debug, Clone, Deserialize)]
pub struct Retrieval {
	#[serde(default = "default_distance_lower_bound")]
	pub distance_lower_bound: f64,
	#[serde(default = "default_distance_upper_bound")]
	pub distance_upper_bound: f64,
	#[serde(default = "default_source_limit")]
	pub source_limit: u32,
	#[serde(default = "default_suggestion_limit")]
	pub suggestion_limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
	#[serde(default)]
	pub api_auth_token: Option<String>,
}

fn default_distance_lower_bound() -> f64 {
	0.01
}

fn default_distance_upper_bound() -> f64 {
	0.5
}

fn default_source_limit() -> u32 {
	4
}

fn default_suggestion_limit() -> u32 {
	2
}
