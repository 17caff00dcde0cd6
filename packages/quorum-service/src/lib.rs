pub mod notifications;
pub mod realtime;
pub mod request;
pub mod requests;
pub mod resources;
pub mod respond;
pub mod retrieve;
pub mod time_serde;
pub mod turns;

mod error;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub use error::{Error, Result};
pub use notifications::{
	DeleteNotification, ListNotifications, ListNotificationsResponse, MarkNotificationsRead,
	MarkNotificationsReadResponse, NotificationItem,
};
pub use realtime::{AuthorizeChannel, ChannelAuth};
pub use request::{AccessRequestCreated, CreateAccessRequest};
pub use requests::{
	ChunkPreview, Direction, ListRequests, ListRequestsResponse, ParentMessage, RequestItem,
	RequestParty,
};
pub use resources::{
	CreateResource, DeleteResource, PurgeResource, ResourceResponse, UpdateResource,
};
pub use respond::{RespondRequest, RespondResponse};
pub use retrieve::{KnowledgeSource, KnowledgeSuggestion, RetrieveRequest, RetrieveResponse};
pub use turns::{IngestTurn, IngestTurnResponse, MessageRole};

pub use quorum_domain::request_state::{Decision, RequestStatus};

use quorum_config::{Config, EmbeddingProviderConfig, Realtime};
use quorum_domain::band::DistanceBand;
use quorum_providers::{embedding, push};
use quorum_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait PushProvider
where
	Self: Send + Sync,
{
	fn trigger<'a>(
		&'a self,
		cfg: &'a Realtime,
		channel: &'a str,
		event: &'a str,
		payload: &'a Value,
	) -> BoxFuture<'a, color_eyre::Result<()>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub push: Arc<dyn PushProvider>,
}

pub struct QuorumService {
	pub cfg: Config,
	pub db: Db,
	pub providers: Providers,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl PushProvider for DefaultProviders {
	fn trigger<'a>(
		&'a self,
		cfg: &'a Realtime,
		channel: &'a str,
		event: &'a str,
		payload: &'a Value,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(push::trigger(cfg, channel, event, payload))
	}
}

impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, push: Arc<dyn PushProvider>) -> Self {
		Self { embedding, push }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), push: provider }
	}
}

impl QuorumService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self { cfg, db, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, db: Db, providers: Providers) -> Self {
		Self { cfg, db, providers }
	}

	pub(crate) fn distance_band(&self) -> DistanceBand {
		DistanceBand::new(
			self.cfg.retrieval.distance_lower_bound,
			self.cfg.retrieval.distance_upper_bound,
		)
	}

	/// Embeds `texts` through the configured provider, enforcing the
	/// one-vector-per-text and dimension contracts.
	pub(crate) async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let vectors = self.providers.embedding.embed(&self.cfg.providers.embedding, texts).await?;

		if vectors.len() != texts.len() {
			return Err(Error::Provider {
				message: "Embedding provider returned the wrong number of vectors.".to_string(),
			});
		}

		for vec in &vectors {
			if vec.len() != self.cfg.providers.embedding.dimensions as usize {
				return Err(Error::Provider {
					message: "Embedding vector dimension mismatch.".to_string(),
				});
			}
		}

		Ok(vectors)
	}

	/// Fire-and-forget realtime delivery. The durable notification row is the
	/// source of truth; a failed push only costs latency.
	pub(crate) async fn push_to_user(&self, user_id: &str, event: &str, payload: &Value) {
		let channel = quorum_domain::channel::user_channel(user_id);

		if let Err(err) =
			self.providers.push.trigger(&self.cfg.realtime, &channel, event, payload).await
		{
			tracing::warn!(%channel, event, "Realtime push failed: {err}.");
		}
	}
}

pub(crate) fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);
	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}
		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

pub(crate) fn rfc3339(ts: OffsetDateTime) -> String {
	ts.format(&Rfc3339).unwrap_or_default()
}
