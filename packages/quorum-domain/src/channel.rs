/// Private realtime channel for one user.
pub fn user_channel(user_id: &str) -> String {
	format!("private-user-{user_id}")
}

/// A client may only subscribe to its own channel.
pub fn subscription_allowed(user_id: &str, channel: &str) -> bool {
	channel == user_channel(user_id)
}
