use axum::{
	Json, Router,
	extract::{Query, Request, State},
	http::{HeaderMap, StatusCode, header::AUTHORIZATION},
	middleware::{self, Next},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use quorum_service::{
	AuthorizeChannel, ChannelAuth, CreateAccessRequest, CreateResource, Decision,
	DeleteNotification, DeleteResource, Direction, Error as ServiceError, IngestTurn,
	IngestTurnResponse, ListNotifications, ListNotificationsResponse, ListRequests,
	ListRequestsResponse, MarkNotificationsRead, MessageRole, PurgeResource, RequestStatus,
	ResourceResponse, RespondRequest, RetrieveResponse, UpdateResource,
};

use crate::state::AppState;

const USER_ID_HEADER: &str = "x-quorum-user-id";
const ORG_ID_HEADER: &str = "x-quorum-org-id";

pub fn router(state: AppState) -> Router {
	let api = Router::new()
		.route("/v1/retrieve", post(retrieve))
		.route("/v1/knowledge/requests", post(create_request).get(list_requests))
		.route("/v1/knowledge/respond", post(respond))
		.route(
			"/v1/notifications",
			get(list_notifications).patch(mark_notifications_read).delete(delete_notification),
		)
		.route("/v1/resources", post(create_resource))
		.route("/v1/resources/update", post(update_resource))
		.route("/v1/resources/delete", post(delete_resource))
		.route("/v1/resources/purge", post(purge_resource))
		.route("/v1/messages", post(ingest_message))
		.route("/v1/realtime/auth", post(realtime_auth))
		.route_layer(middleware::from_fn_with_state(state.clone(), auth_guard))
		.with_state(state);

	Router::new().route("/health", get(health)).merge(api)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn auth_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
	if let Some(expected) = state.service.cfg.security.api_auth_token.as_deref() {
		let provided =
			req.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok());

		if provided != Some(format!("Bearer {expected}").as_str()) {
			return json_error(
				StatusCode::UNAUTHORIZED,
				"unauthorized",
				"Invalid or missing API token.",
				None,
			)
			.into_response();
		}
	}

	next.run(req).await
}

#[derive(Debug, Deserialize)]
struct RetrieveBody {
	question: String,
}

async fn retrieve(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<RetrieveBody>,
) -> Result<Json<RetrieveResponse>, ApiError> {
	let user_id = required_header(&headers, USER_ID_HEADER)?;
	let org_id = required_header(&headers, ORG_ID_HEADER)?;
	let response = state
		.service
		.retrieve(quorum_service::RetrieveRequest { user_id, org_id, question: payload.question })
		.await?;

	Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct CreateRequestBody {
	chunk_id: i64,
	question: String,
	conversation_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct CreateRequestResponse {
	success: bool,
	request_id: i64,
}

async fn create_request(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<CreateRequestBody>,
) -> Result<Json<CreateRequestResponse>, ApiError> {
	let user_id = required_header(&headers, USER_ID_HEADER)?;
	let created = state
		.service
		.create_request(CreateAccessRequest {
			user_id,
			chunk_id: payload.chunk_id,
			question: payload.question,
			conversation_id: payload.conversation_id,
		})
		.await?;

	Ok(Json(CreateRequestResponse { success: true, request_id: created.request_id }))
}

#[derive(Debug, Deserialize)]
struct RespondBody {
	request_id: i64,
	action: Decision,
	response_note: Option<String>,
}

#[derive(Debug, Serialize)]
struct RespondBodyResponse {
	success: bool,
	status: RequestStatus,
}

async fn respond(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<RespondBody>,
) -> Result<Json<RespondBodyResponse>, ApiError> {
	let user_id = required_header(&headers, USER_ID_HEADER)?;
	let resolved = state
		.service
		.respond(RespondRequest {
			user_id,
			request_id: payload.request_id,
			action: payload.action,
			response_note: payload.response_note,
		})
		.await?;

	Ok(Json(RespondBodyResponse { success: true, status: resolved.status }))
}

#[derive(Debug, Deserialize)]
struct ListRequestsQuery {
	#[serde(default, rename = "type")]
	direction: Direction,
	status: Option<RequestStatus>,
}

async fn list_requests(
	State(state): State<AppState>,
	headers: HeaderMap,
	Query(query): Query<ListRequestsQuery>,
) -> Result<Json<ListRequestsResponse>, ApiError> {
	let user_id = required_header(&headers, USER_ID_HEADER)?;
	let response = state
		.service
		.list_requests(ListRequests {
			user_id,
			direction: query.direction,
			status: query.status,
		})
		.await?;

	Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ListNotificationsQuery {
	#[serde(default)]
	unread_only: bool,
	limit: Option<u32>,
}

async fn list_notifications(
	State(state): State<AppState>,
	headers: HeaderMap,
	Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<ListNotificationsResponse>, ApiError> {
	let user_id = required_header(&headers, USER_ID_HEADER)?;
	let response = state
		.service
		.list_notifications(ListNotifications {
			user_id,
			unread_only: query.unread_only,
			limit: query.limit,
		})
		.await?;

	Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct MarkReadBody {
	notification_ids: Option<Vec<i64>>,
	#[serde(default)]
	mark_all_read: bool,
}

#[derive(Debug, Serialize)]
struct MarkReadResponse {
	success: bool,
	updated: u64,
}

async fn mark_notifications_read(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<MarkReadBody>,
) -> Result<Json<MarkReadResponse>, ApiError> {
	let user_id = required_header(&headers, USER_ID_HEADER)?;
	let marked = state
		.service
		.mark_notifications_read(MarkNotificationsRead {
			user_id,
			notification_ids: payload.notification_ids,
			mark_all: payload.mark_all_read,
		})
		.await?;

	Ok(Json(MarkReadResponse { success: true, updated: marked.updated }))
}

#[derive(Debug, Deserialize)]
struct DeleteNotificationQuery {
	id: i64,
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
	success: bool,
}

async fn delete_notification(
	State(state): State<AppState>,
	headers: HeaderMap,
	Query(query): Query<DeleteNotificationQuery>,
) -> Result<Json<SuccessResponse>, ApiError> {
	let user_id = required_header(&headers, USER_ID_HEADER)?;

	state
		.service
		.delete_notification(DeleteNotification { user_id, notification_id: query.id })
		.await?;

	Ok(Json(SuccessResponse { success: true }))
}

#[derive(Debug, Deserialize)]
struct CreateResourceBody {
	content: String,
}

async fn create_resource(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<CreateResourceBody>,
) -> Result<Json<ResourceResponse>, ApiError> {
	let user_id = required_header(&headers, USER_ID_HEADER)?;
	let org_id = required_header(&headers, ORG_ID_HEADER)?;
	let response = state
		.service
		.create_resource(CreateResource { user_id, org_id, content: payload.content })
		.await?;

	Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct UpdateResourceBody {
	resource_id: i64,
	content: String,
}

async fn update_resource(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<UpdateResourceBody>,
) -> Result<Json<ResourceResponse>, ApiError> {
	let user_id = required_header(&headers, USER_ID_HEADER)?;
	let org_id = required_header(&headers, ORG_ID_HEADER)?;
	let response = state
		.service
		.update_resource(UpdateResource {
			user_id,
			org_id,
			resource_id: payload.resource_id,
			content: payload.content,
		})
		.await?;

	Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ResourceIdBody {
	resource_id: i64,
}

async fn delete_resource(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<ResourceIdBody>,
) -> Result<Json<SuccessResponse>, ApiError> {
	let user_id = required_header(&headers, USER_ID_HEADER)?;
	let org_id = required_header(&headers, ORG_ID_HEADER)?;

	state
		.service
		.delete_resource(DeleteResource { user_id, org_id, resource_id: payload.resource_id })
		.await?;

	Ok(Json(SuccessResponse { success: true }))
}

async fn purge_resource(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<ResourceIdBody>,
) -> Result<Json<SuccessResponse>, ApiError> {
	let user_id = required_header(&headers, USER_ID_HEADER)?;
	let org_id = required_header(&headers, ORG_ID_HEADER)?;

	state
		.service
		.purge_resource(PurgeResource { user_id, org_id, resource_id: payload.resource_id })
		.await?;

	Ok(Json(SuccessResponse { success: true }))
}

#[derive(Debug, Deserialize)]
struct IngestMessageBody {
	conversation_id: Option<i64>,
	role: MessageRole,
	content: String,
}

async fn ingest_message(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<IngestMessageBody>,
) -> Result<Json<IngestTurnResponse>, ApiError> {
	let user_id = required_header(&headers, USER_ID_HEADER)?;
	let org_id = required_header(&headers, ORG_ID_HEADER)?;
	let response = state
		.service
		.ingest_turn(IngestTurn {
			user_id,
			org_id,
			conversation_id: payload.conversation_id,
			role: payload.role,
			content: payload.content,
		})
		.await?;

	Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct RealtimeAuthBody {
	socket_id: String,
	channel_name: String,
}

async fn realtime_auth(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<RealtimeAuthBody>,
) -> Result<Json<ChannelAuth>, ApiError> {
	let user_id = required_header(&headers, USER_ID_HEADER)?;
	let response = state.service.authorize_channel(AuthorizeChannel {
		user_id,
		socket_id: payload.socket_id,
		channel_name: payload.channel_name,
	})?;

	Ok(Json(response))
}

fn required_header(headers: &HeaderMap, name: &str) -> Result<String, ApiError> {
	headers
		.get(name)
		.and_then(|value| value.to_str().ok())
		.map(str::trim)
		.filter(|value| !value.is_empty())
		.map(ToString::to_string)
		.ok_or_else(|| {
			json_error(
				StatusCode::BAD_REQUEST,
				"missing_header",
				format!("{name} header is required."),
				Some(vec![name.to_string()]),
			)
		})
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message, None),
			ServiceError::Forbidden { message } =>
				json_error(StatusCode::FORBIDDEN, "forbidden", message, None),
			ServiceError::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "not_found", message, None),
			ServiceError::Conflict { message } =>
				json_error(StatusCode::CONFLICT, "conflict", message, None),
			ServiceError::Provider { message } => {
				tracing::error!("Provider failure: {message}");

				json_error(
					StatusCode::BAD_GATEWAY,
					"provider_unavailable",
					"Upstream provider failed, please try again.",
					None,
				)
			},
			ServiceError::Storage { message } => {
				tracing::error!("Storage failure: {message}");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"storage_failure",
					"Storage failure, please try again.",
					None,
				)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody {
			error_code: self.error_code,
			message: self.message,
			fields: self.fields,
		};

		(self.status, Json(body)).into_response()
	}
}
