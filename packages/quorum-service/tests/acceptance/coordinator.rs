use std::sync::Arc;

use quorum_service::{
	CreateAccessRequest, Decision, Error, Providers, RequestStatus, RespondRequest,
};

use crate::support::{
	self, ALICE, BOB, FailPush, MapEmbedding, QUESTION,
};

fn create_req(chunk_id: i64) -> CreateAccessRequest {
	CreateAccessRequest {
		user_id: ALICE.to_string(),
		chunk_id,
		question: QUESTION.to_string(),
		conversation_id: None,
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set QUORUM_PG_DSN to run."]
async fn duplicate_pending_request_is_rejected() {
	let Some((test_db, pool)) = support::setup().await else { return };
	let (providers, _push) = support::standard_providers();
	let service =
		support::service(pool.clone(), support::test_config(test_db.dsn().to_string()), providers);

	support::seed_both_members(&pool).await;

	let chunk_id = support::seed_bob_chunk(&service, &pool).await;
	let first = service.create_request(create_req(chunk_id)).await.expect("First create failed.");
	let second = service.create_request(create_req(chunk_id)).await;

	assert!(matches!(
		second,
		Err(Error::Conflict { ref message })
			if message == "You already have a pending request for this knowledge."
	));

	// The first request is untouched.
	let status: String =
		sqlx::query_scalar("SELECT status FROM access_requests WHERE request_id = $1")
			.bind(first.request_id)
			.fetch_one(&pool)
			.await
			.expect("Failed to read request status.");

	assert_eq!(status, "pending");

	let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM access_requests")
		.fetch_one(&pool)
		.await
		.expect("Failed to count requests.");

	assert_eq!(count, 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set QUORUM_PG_DSN to run."]
async fn requesting_own_knowledge_is_rejected() {
	let Some((test_db, pool)) = support::setup().await else { return };
	let (providers, _push) = support::standard_providers();
	let service =
		support::service(pool.clone(), support::test_config(test_db.dsn().to_string()), providers);

	support::seed_both_members(&pool).await;

	let chunk_id = support::seed_bob_chunk(&service, &pool).await;
	let result = service
		.create_request(CreateAccessRequest {
			user_id: BOB.to_string(),
			chunk_id,
			question: QUESTION.to_string(),
			conversation_id: None,
		})
		.await;

	assert!(matches!(
		result,
		Err(Error::InvalidRequest { ref message })
			if message == "Cannot request your own knowledge."
	));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set QUORUM_PG_DSN to run."]
async fn unknown_chunk_is_not_found() {
	let Some((test_db, pool)) = support::setup().await else { return };
	let (providers, _push) = support::standard_providers();
	let service =
		support::service(pool.clone(), support::test_config(test_db.dsn().to_string()), providers);

	support::seed_both_members(&pool).await;

	let result = service.create_request(create_req(9_999)).await;

	assert!(matches!(result, Err(Error::NotFound { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set QUORUM_PG_DSN to run."]
async fn approval_creates_exactly_one_grant_and_resolves_once() {
	let Some((test_db, pool)) = support::setup().await else { return };
	let (providers, push) = support::standard_providers();
	let service =
		support::service(pool.clone(), support::test_config(test_db.dsn().to_string()), providers);

	support::seed_both_members(&pool).await;

	let chunk_id = support::seed_bob_chunk(&service, &pool).await;
	let created = service.create_request(create_req(chunk_id)).await.expect("Create failed.");
	let resolved = service
		.respond(RespondRequest {
			user_id: BOB.to_string(),
			request_id: created.request_id,
			action: Decision::Approve,
			response_note: Some("Happy to share.".to_string()),
		})
		.await
		.expect("Respond failed.");

	assert_eq!(resolved.status, RequestStatus::Approved);

	let (grant_count, responded_at_set): (i64, bool) = sqlx::query_as(
		"\
SELECT
	(SELECT COUNT(*) FROM grants WHERE chunk_id = $1 AND granted_to_user_id = $2),
	(SELECT responded_at IS NOT NULL FROM access_requests WHERE request_id = $3)",
	)
	.bind(chunk_id)
	.bind(ALICE)
	.bind(created.request_id)
	.fetch_one(&pool)
	.await
	.expect("Failed to inspect grant state.");

	assert_eq!(grant_count, 1);
	assert!(responded_at_set);

	// A second respond finds nothing pending and must not double-grant.
	let again = service
		.respond(RespondRequest {
			user_id: BOB.to_string(),
			request_id: created.request_id,
			action: Decision::Approve,
			response_note: None,
		})
		.await;

	assert!(matches!(
		again,
		Err(Error::NotFound { ref message })
			if message == "Request not found or already processed."
	));

	let grants: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM grants")
		.fetch_one(&pool)
		.await
		.expect("Failed to count grants.");

	assert_eq!(grants, 1);

	// One event to the owner on create, one to the requester on respond.
	let events = push.events.lock().unwrap_or_else(|err| err.into_inner());

	assert_eq!(events.len(), 2);
	assert_eq!(events[0].0, format!("private-user-{BOB}"));
	assert_eq!(events[0].1, "request-created");
	assert_eq!(events[1].0, format!("private-user-{ALICE}"));
	assert_eq!(events[1].1, "request-response");

	drop(events);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set QUORUM_PG_DSN to run."]
async fn denial_never_grants() {
	let Some((test_db, pool)) = support::setup().await else { return };
	let (providers, _push) = support::standard_providers();
	let service =
		support::service(pool.clone(), support::test_config(test_db.dsn().to_string()), providers);

	support::seed_both_members(&pool).await;

	let chunk_id = support::seed_bob_chunk(&service, &pool).await;
	let created = service.create_request(create_req(chunk_id)).await.expect("Create failed.");
	let resolved = service
		.respond(RespondRequest {
			user_id: BOB.to_string(),
			request_id: created.request_id,
			action: Decision::Deny,
			response_note: None,
		})
		.await
		.expect("Respond failed.");

	assert_eq!(resolved.status, RequestStatus::Denied);

	let grants: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM grants")
		.fetch_one(&pool)
		.await
		.expect("Failed to count grants.");

	assert_eq!(grants, 0);

	let again = service
		.respond(RespondRequest {
			user_id: BOB.to_string(),
			request_id: created.request_id,
			action: Decision::Deny,
			response_note: None,
		})
		.await;

	assert!(matches!(again, Err(Error::NotFound { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set QUORUM_PG_DSN to run."]
async fn only_the_owner_can_respond() {
	let Some((test_db, pool)) = support::setup().await else { return };
	let (providers, _push) = support::standard_providers();
	let service =
		support::service(pool.clone(), support::test_config(test_db.dsn().to_string()), providers);

	support::seed_both_members(&pool).await;

	let chunk_id = support::seed_bob_chunk(&service, &pool).await;
	let created = service.create_request(create_req(chunk_id)).await.expect("Create failed.");
	// The requester probing their own request looks identical to a missing
	// request.
	let result = service
		.respond(RespondRequest {
			user_id: ALICE.to_string(),
			request_id: created.request_id,
			action: Decision::Approve,
			response_note: None,
		})
		.await;

	assert!(matches!(
		result,
		Err(Error::NotFound { ref message })
			if message == "Request not found or already processed."
	));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set QUORUM_PG_DSN to run."]
async fn already_shared_knowledge_cannot_be_requested_again() {
	let Some((test_db, pool)) = support::setup().await else { return };
	let (providers, _push) = support::standard_providers();
	let service =
		support::service(pool.clone(), support::test_config(test_db.dsn().to_string()), providers);

	support::seed_both_members(&pool).await;

	let chunk_id = support::seed_bob_chunk(&service, &pool).await;
	let created = service.create_request(create_req(chunk_id)).await.expect("Create failed.");

	service
		.respond(RespondRequest {
			user_id: BOB.to_string(),
			request_id: created.request_id,
			action: Decision::Approve,
			response_note: None,
		})
		.await
		.expect("Respond failed.");

	let result = service.create_request(create_req(chunk_id)).await;

	assert!(matches!(
		result,
		Err(Error::Conflict { ref message })
			if message == "This knowledge is already shared with you."
	));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set QUORUM_PG_DSN to run."]
async fn push_failure_never_fails_the_operation() {
	let Some((test_db, pool)) = support::setup().await else { return };
	let providers = Providers::new(Arc::new(MapEmbedding::standard()), Arc::new(FailPush));
	let service =
		support::service(pool.clone(), support::test_config(test_db.dsn().to_string()), providers);

	support::seed_both_members(&pool).await;

	let chunk_id = support::seed_bob_chunk(&service, &pool).await;
	let created =
		service.create_request(create_req(chunk_id)).await.expect("Create must survive push failure.");

	service
		.respond(RespondRequest {
			user_id: BOB.to_string(),
			request_id: created.request_id,
			action: Decision::Approve,
			response_note: None,
		})
		.await
		.expect("Respond must survive push failure.");

	// Durable state is intact: the notification rows exist even though no
	// realtime event went out.
	let notifications: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications")
		.fetch_one(&pool)
		.await
		.expect("Failed to count notifications.");

	assert_eq!(notifications, 2);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
