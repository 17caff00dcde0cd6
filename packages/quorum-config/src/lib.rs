mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Postgres, Providers, Realtime, Retrieval, Security, Service,
	Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.api_key must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.model.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.model must be non-empty.".to_string(),
		});
	}

	for (label, value) in [
		("realtime.app_id", &cfg.realtime.app_id),
		("realtime.key", &cfg.realtime.key),
		("realtime.secret", &cfg.realtime.secret),
		("realtime.api_base", &cfg.realtime.api_base),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.realtime.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "realtime.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !cfg.retrieval.distance_lower_bound.is_finite()
		|| !cfg.retrieval.distance_upper_bound.is_finite()
	{
		return Err(Error::Validation {
			message: "retrieval distance bounds must be finite numbers.".to_string(),
		});
	}
	if cfg.retrieval.distance_lower_bound < 0.0 {
		return Err(Error::Validation {
			message: "retrieval.distance_lower_bound must be zero or greater.".to_string(),
		});
	}
	if cfg.retrieval.distance_lower_bound >= cfg.retrieval.distance_upper_bound {
		return Err(Error::Validation {
			message: "retrieval.distance_lower_bound must be less than retrieval.distance_upper_bound."
				.to_string(),
		});
	}
	if cfg.retrieval.source_limit == 0 {
		return Err(Error::Validation {
			message: "retrieval.source_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.suggestion_limit == 0 {
		return Err(Error::Validation {
			message: "retrieval.suggestion_limit must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.security
		.api_auth_token
		.as_deref()
		.map(|token| token.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.security.api_auth_token = None;
	}
}
