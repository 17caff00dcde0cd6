use serde::{Deserialize, Serialize};

use quorum_domain::channel;
use quorum_providers::push;

use crate::{Error, QuorumService, Result};

pub const EVENT_REQUEST_CREATED: &str = "request-created";
pub const EVENT_REQUEST_RESPONSE: &str = "request-response";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthorizeChannel {
	pub user_id: String,
	pub socket_id: String,
	pub channel_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelAuth {
	pub auth: String,
}

impl QuorumService {
	/// Signs a private-channel subscription, but only for the caller's own
	/// channel.
	pub fn authorize_channel(&self, req: AuthorizeChannel) -> Result<ChannelAuth> {
		let user_id = req.user_id.trim();
		let socket_id = req.socket_id.trim();
		let channel_name = req.channel_name.trim();

		if user_id.is_empty() || socket_id.is_empty() || channel_name.is_empty() {
			return Err(Error::InvalidRequest {
				message: "user_id, socket_id, and channel_name are required.".to_string(),
			});
		}
		if !channel::subscription_allowed(user_id, channel_name) {
			return Err(Error::Forbidden {
				message: "Unauthorized channel subscription.".to_string(),
			});
		}

		Ok(ChannelAuth { auth: push::authorize(&self.cfg.realtime, socket_id, channel_name) })
	}
}
