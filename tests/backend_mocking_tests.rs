//! Collaboration backend mocking tests
//!
//! These tests use wiremock to stand in for the collaboration backend so the
//! HTTP backend can be exercised end to end without a running server.

use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use workflow_runner::backend::{BackendError, ConflictBackend, HttpBackend, WorkflowBackend};
use workflow_runner::config::BackendConfig;
use workflow_runner::conflicts::{NewConflict, ResolutionMethod, VoteRequest};
use workflow_runner::workflows::{SessionStatus, StepResult};

/// Collaboration backend mock server for deterministic testing
pub struct BackendMock {
    pub server: MockServer,
}

impl BackendMock {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn config(&self) -> BackendConfig {
        BackendConfig {
            base_url: self.server.uri(),
            api_token: Some("mock-token".to_string()),
            request_timeout_seconds: Some(5),
            ..BackendConfig::default()
        }
    }

    pub fn backend(&self) -> HttpBackend {
        let http = workflow_runner::RateLimitedHttpClient::new(&self.config())
            .unwrap()
            .with_retry_policy(workflow_runner::RetryPolicy::none());
        HttpBackend::from_client(http)
    }

    pub async fn mock_workflows(&self) {
        Mock::given(method("GET"))
            .and(path("/api/workflows/"))
            .and(header("authorization", "Bearer mock-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": 3,
                    "name": "Research",
                    "description": "Collect and summarise",
                    "steps": [
                        {"name": "Collect", "description": "", "agent_role": "researcher", "instructions": "Find sources", "depends_on": []},
                        {"name": "Summarise", "description": "", "instructions": "Summarise", "depends_on": [0], "expected_output": "A summary"}
                    ],
                    "is_public": true,
                    "owner_id": 1,
                    "created_at": "2024-03-01T09:00:00",
                    "updated_at": null
                }
            ])))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_sessions(&self, outer_session_id: i64, sessions: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/workflows/sessions/{outer_session_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(sessions))
            .mount(&self.server)
            .await;
    }
}

fn session_json(id: i64, status: &str, current_step: usize, results: Value) -> Value {
    json!({
        "id": id,
        "workflow_id": 3,
        "session_id": 7,
        "status": status,
        "current_step": current_step,
        "results": results,
        "created_at": "2024-03-01T09:05:00",
        "updated_at": null
    })
}

#[tokio::test]
async fn test_list_workflows_decodes_definitions() {
    let mock = BackendMock::new().await;
    mock.mock_workflows().await;

    let workflows = mock.backend().list_workflows().await.unwrap();
    assert_eq!(workflows.len(), 1);
    assert_eq!(workflows[0].steps[1].dependency_labels(), vec![1]);
    assert_eq!(workflows[0].steps[0].agent_role.as_deref(), Some("researcher"));
    assert!(workflows[0].validate().is_ok());
}

#[tokio::test]
async fn test_list_sessions_decodes_result_shapes() {
    let mock = BackendMock::new().await;
    mock.mock_sessions(
        7,
        json!([session_json(
            11,
            "in_progress",
            1,
            json!({"0": {"content": "Found 4 sources", "agent_name": "Researcher", "timestamp": "2024-03-01T09:06:00"}})
        )]),
    )
    .await;

    let sessions = mock.backend().list_sessions(7).await.unwrap();
    assert_eq!(sessions[0].status, SessionStatus::InProgress);
    let result = &sessions[0].results[&0];
    assert_eq!(result.agent_name(), Some("Researcher"));
    assert_eq!(result.display_content(), "Found 4 sources");
}

#[tokio::test]
async fn test_start_session_posts_pending_body() {
    let mock = BackendMock::new().await;
    Mock::given(method("POST"))
        .and(path("/api/workflows/sessions/"))
        .and(body_json(json!({
            "workflow_id": 3,
            "session_id": 7,
            "status": "pending",
            "current_step": 0,
            "results": {}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json(12, "pending", 0, json!({}))))
        .expect(1)
        .mount(&mock.server)
        .await;

    let session = mock.backend().start_session(3, 7).await.unwrap();
    assert_eq!(session.id, 12);
    assert_eq!(session.status, SessionStatus::Pending);
    assert!(session.results.is_empty());
}

#[tokio::test]
async fn test_execute_next_step_falls_back_to_top_level_content() {
    let mock = BackendMock::new().await;
    Mock::given(method("POST"))
        .and(path("/api/workflows/execute/12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "in_progress",
            "current_step": 1,
            "agent_name": "Researcher",
            "timestamp": "2024-03-01T09:06:00",
            "content": "Found 4 sources"
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let response = mock.backend().execute_next_step(12).await.unwrap();
    assert_eq!(response.current_step, 1);
    assert!(response.step_result.is_none());
    let recorded = response.recorded_result();
    assert_eq!(recorded.agent_name(), Some("Researcher"));
    assert_eq!(recorded, StepResult::message("Found 4 sources", Some("Researcher".to_string()), Some("2024-03-01T09:06:00".to_string())));
}

#[tokio::test]
async fn test_error_detail_is_surfaced() {
    let mock = BackendMock::new().await;
    Mock::given(method("POST"))
        .and(path("/api/workflows/execute/12"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "Workflow session is already completed"})))
        .expect(1)
        .mount(&mock.server)
        .await;

    let err = mock.backend().execute_next_step(12).await.unwrap_err();
    match err {
        BackendError::Api { status, detail } => {
            assert_eq!(status.as_u16(), 400);
            assert_eq!(detail, "Workflow session is already completed");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_execution_invalidates_cached_session_listing() {
    let mock = BackendMock::new().await;
    mock.mock_sessions(7, json!([session_json(11, "in_progress", 1, json!({"0": "r0"}))]))
        .await;
    Mock::given(method("POST"))
        .and(path("/api/workflows/execute/11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "in_progress",
            "current_step": 2,
            "step_result": "r1"
        })))
        .mount(&mock.server)
        .await;

    let backend = mock.backend();
    backend.list_sessions(7).await.unwrap();
    backend.list_sessions(7).await.unwrap();
    backend.execute_next_step(11).await.unwrap();
    backend.list_sessions(7).await.unwrap();

    let listing_requests = mock
        .server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|request| request.method.as_str() == "GET")
        .count();
    assert_eq!(listing_requests, 2);
}

#[tokio::test]
async fn test_conflict_endpoints() {
    let mock = BackendMock::new().await;
    let conflict = json!({
        "id": 5,
        "session_id": 7,
        "conflict_message_id": 40,
        "resolution_method": "voting",
        "resolution_data": {"options": ["A...", "B..."], "votes": {"2": "A..."}, "vote_counts": {"A...": 1}, "total_votes": 1},
        "resolved_by_agent_id": null,
        "resolution_message_id": null,
        "created_at": "2024-03-01T10:00:00",
        "resolved_at": null
    });

    Mock::given(method("GET"))
        .and(path("/api/conflict-resolution/session/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([conflict.clone()])))
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sessions/7/agents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 2, "name": "Coder", "role": "engineer"},
            {"id": 3, "name": "Reviewer", "role": "qa"}
        ])))
        .mount(&mock.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/conflict-resolution/5/vote"))
        .and(body_json(json!({"agent_id": 3, "vote": "B..."})))
        .respond_with(ResponseTemplate::new(200).set_body_json(conflict.clone()))
        .expect(1)
        .mount(&mock.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/conflict-resolution/"))
        .and(body_json(json!({
            "session_id": 7,
            "conflict_message_id": 40,
            "resolution_method": "consensus",
            "resolution_data": {"proposals": {}},
            "resolved_by_agent_id": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(conflict.clone()))
        .expect(1)
        .mount(&mock.server)
        .await;

    let backend = mock.backend();
    let conflicts = backend.list_conflicts(7).await.unwrap();
    let agents = backend.list_agents(7).await.unwrap();
    assert_eq!(conflicts[0].method(), ResolutionMethod::Voting);
    assert_eq!(conflicts[0].progress(agents.len()).unwrap().percent(), 50);

    backend
        .submit_vote(
            5,
            VoteRequest {
                agent_id: 3,
                vote: "B...".to_string(),
            },
        )
        .await
        .unwrap();

    let request = NewConflict::for_method(7, 40, &ResolutionMethod::Consensus, &[], 3);
    backend.create_conflict(request).await.unwrap();
}
