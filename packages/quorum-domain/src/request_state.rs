use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
	Pending,
	Approved,
	Denied,
}
impl RequestStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Approved => "approved",
			Self::Denied => "denied",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"pending" => Some(Self::Pending),
			"approved" => Some(Self::Approved),
			"denied" => Some(Self::Denied),
			_ => None,
		}
	}

	pub fn is_terminal(&self) -> bool {
		!matches!(self, Self::Pending)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
	Approve,
	Deny,
}
impl Decision {
	pub fn resolved_status(&self) -> RequestStatus {
		match self {
			Self::Approve => RequestStatus::Approved,
			Self::Deny => RequestStatus::Denied,
		}
	}
}

/// The only legal transitions are pending -> approved and pending -> denied.
/// Returns None when the request is already resolved.
pub fn transition(current: RequestStatus, decision: Decision) -> Option<RequestStatus> {
	match current {
		RequestStatus::Pending => Some(decision.resolved_status()),
		RequestStatus::Approved | RequestStatus::Denied => None,
	}
}
