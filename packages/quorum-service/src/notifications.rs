use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::{Error, QuorumService, Result};

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListNotifications {
	pub user_id: String,
	#[serde(default)]
	pub unread_only: bool,
	pub limit: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationItem {
	pub notification_id: i64,
	pub kind: String,
	pub payload: Value,
	pub read: bool,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListNotificationsResponse {
	pub notifications: Vec<NotificationItem>,
	pub unread_count: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarkNotificationsRead {
	pub user_id: String,
	pub notification_ids: Option<Vec<i64>>,
	#[serde(default)]
	pub mark_all: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarkNotificationsReadResponse {
	pub updated: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteNotification {
	pub user_id: String,
	pub notification_id: i64,
}

#[derive(FromRow)]
struct NotificationRow {
	notification_id: i64,
	kind: String,
	payload: Value,
	read: bool,
	created_at: OffsetDateTime,
}

impl QuorumService {
	pub async fn list_notifications(
		&self,
		req: ListNotifications,
	) -> Result<ListNotificationsResponse> {
		let user_id = req.user_id.trim();

		if user_id.is_empty() {
			return Err(Error::InvalidRequest { message: "user_id is required.".to_string() });
		}

		let limit = i64::from(req.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT));
		let mut builder = sqlx::QueryBuilder::new(
			"SELECT notification_id, kind, payload, read, created_at \
			 FROM notifications WHERE user_id = ",
		);
		builder.push_bind(user_id);

		if req.unread_only {
			builder.push(" AND read = FALSE");
		}

		builder.push(" ORDER BY created_at DESC, notification_id DESC LIMIT ");
		builder.push_bind(limit);

		let rows: Vec<NotificationRow> = builder.build_query_as().fetch_all(&self.db.pool).await?;
		let unread_count: i64 = sqlx::query_scalar(
			"SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = FALSE",
		)
		.bind(user_id)
		.fetch_one(&self.db.pool)
		.await?;
		let notifications = rows
			.into_iter()
			.map(|row| NotificationItem {
				notification_id: row.notification_id,
				kind: row.kind,
				payload: row.payload,
				read: row.read,
				created_at: row.created_at,
			})
			.collect();

		Ok(ListNotificationsResponse { notifications, unread_count })
	}

	pub async fn mark_notifications_read(
		&self,
		req: MarkNotificationsRead,
	) -> Result<MarkNotificationsReadResponse> {
		let user_id = req.user_id.trim();

		if user_id.is_empty() {
			return Err(Error::InvalidRequest { message: "user_id is required.".to_string() });
		}

		let updated = if req.mark_all {
			sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND read = FALSE")
				.bind(user_id)
				.execute(&self.db.pool)
				.await?
				.rows_affected()
		} else {
			let ids = req.notification_ids.unwrap_or_default();

			if ids.is_empty() {
				return Err(Error::InvalidRequest {
					message: "Provide notification_ids or set mark_all.".to_string(),
				});
			}

			sqlx::query(
				"UPDATE notifications SET read = TRUE WHERE user_id = $1 AND notification_id = ANY($2)",
			)
			.bind(user_id)
			.bind(ids.as_slice())
			.execute(&self.db.pool)
			.await?
			.rows_affected()
		};

		Ok(MarkNotificationsReadResponse { updated })
	}

	pub async fn delete_notification(&self, req: DeleteNotification) -> Result<()> {
		let user_id = req.user_id.trim();

		if user_id.is_empty() {
			return Err(Error::InvalidRequest { message: "user_id is required.".to_string() });
		}

		let deleted = sqlx::query(
			"DELETE FROM notifications WHERE notification_id = $1 AND user_id = $2",
		)
		.bind(req.notification_id)
		.bind(user_id)
		.execute(&self.db.pool)
		.await?
		.rows_affected();

		if deleted == 0 {
			return Err(Error::NotFound { message: "Notification not found.".to_string() });
		}

		Ok(())
	}
}
