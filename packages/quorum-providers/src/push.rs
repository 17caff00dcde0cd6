use std::time::Duration;

use color_eyre::Result;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Publishes one event to a user channel through the Pusher-compatible REST
/// API. Requests are signed per the Channels protocol: MD5 of the body plus
/// an HMAC-SHA256 over the method, path, and sorted query string.
pub async fn trigger(
	cfg: &quorum_config::Realtime,
	channel: &str,
	event: &str,
	payload: &Value,
) -> Result<()> {
	let body = serde_json::json!({
		"name": event,
		"channel": channel,
		"data": payload.to_string(),
	})
	.to_string();
	let timestamp = time::OffsetDateTime::now_utc().unix_timestamp();
	let path = format!("/apps/{}/events", cfg.app_id);
	let query = signed_query(cfg, &path, &body, timestamp);
	let url = format!("{}{}?{}", cfg.api_base, path, query);
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

	client
		.post(url)
		.header("content-type", "application/json")
		.body(body)
		.send()
		.await?
		.error_for_status()?;

	Ok(())
}

/// Private-channel subscription token: `<key>:<signature>` where the
/// signature is HMAC-SHA256 over `"<socket_id>:<channel>"`.
pub fn authorize(cfg: &quorum_config::Realtime, socket_id: &str, channel: &str) -> String {
	let signature = hmac_hex(&cfg.secret, &format!("{socket_id}:{channel}"));

	format!("{}:{signature}", cfg.key)
}

fn signed_query(cfg: &quorum_config::Realtime, path: &str, body: &str, timestamp: i64) -> String {
	let body_md5 = format!("{:x}", md5::compute(body.as_bytes()));
	// Keys must stay in alphabetical order for the signature to verify.
	let params = format!(
		"auth_key={}&auth_timestamp={timestamp}&auth_version=1.0&body_md5={body_md5}",
		cfg.key
	);
	let to_sign = format!("POST\n{path}\n{params}");
	let signature = hmac_hex(&cfg.secret, &to_sign);

	format!("{params}&auth_signature={signature}")
}

fn hmac_hex(secret: &str, message: &str) -> String {
	let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
		.expect("HMAC accepts keys of any length");
	mac.update(message.as_bytes());

	hex::encode(mac.finalize().into_bytes())
}
