use std::sync::Arc;

use quorum_service::QuorumService;
use quorum_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<QuorumService>,
}
impl AppState {
	pub async fn new(config: quorum_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.providers.embedding.dimensions).await?;

		let service = QuorumService::new(config, db);

		Ok(Self { service: Arc::new(service) })
	}
}
