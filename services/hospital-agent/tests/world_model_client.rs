//! HTTP wire tests for the world model client.
//!
//! Each test stands up a wiremock server in place of the world model and
//! checks the request shapes the client sends and how it reads answers.

use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use triage_hospital_agent::backoff::BackoffPolicy;
use triage_hospital_agent::config::Config;
use triage_hospital_agent::error::GatewayError;
use triage_hospital_agent::gateway::WorldModelGateway;
use triage_hospital_agent::model::{DischargeStatus, LifeStatus};
use triage_hospital_agent::registration::{register_until_success, registration_request};
use triage_hospital_agent::roster::DoctorRoster;
use triage_hospital_agent::WorldModelClient;
use triage_id::{EntityId, PersonId, SnapshotId};
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> WorldModelClient {
    let config = Config {
        world_model_url: format!("{}/api/", server.uri()),
        request_timeout: Duration::from_millis(500),
        ..Config::default()
    };
    WorldModelClient::new(&config)
}

#[tokio::test]
async fn test_register_posts_facility_attributes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/register"))
        .and(body_partial_json(json!({
            "type": "Hospital",
            "max_capacity": 15,
            "eav": { "name": "central" }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "entity_id": 42, "time_rate": 2.5 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = registration_request("central", 15, &DoctorRoster::seeded());
    let registration = client.register(&request).await.unwrap();

    assert_eq!(registration.entity_id, EntityId::new(42));
    assert_eq!(registration.time_rate, 2.5);
}

#[tokio::test]
async fn test_registration_retries_through_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/register"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/register"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "entity_id": "7" })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = registration_request("central", 3, &DoctorRoster::seeded());
    let backoff = BackoffPolicy {
        base: Duration::from_millis(5),
        max: Duration::from_millis(20),
        jitter: 0.0,
    };
    let (_tx, mut rx) = watch::channel(false);

    let registration = register_until_success(&client, &request, &backoff, &mut rx)
        .await
        .unwrap();

    assert_eq!(registration.entity_id, EntityId::new(7));
    assert_eq!(registration.time_rate, 1.0);
}

#[tokio::test]
async fn test_fetch_snapshot_decodes_persons() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/snapshot/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 9,
            "earthquake_status": true,
            "persons": [
                {
                    "id": 1,
                    "name": "Ali Rezaei",
                    "gender": "male",
                    "birth_date": "1990-01-02T00:00:00",
                    "national_code": "0012345678",
                    "status": "injured"
                },
                {
                    "id": "2",
                    "name": "Sara Ahmadi",
                    "gender": "female",
                    "birth_date": "1985-07-30",
                    "national_code": "0098765432",
                    "death_date": "2024-03-01",
                    "status": "dead"
                }
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let snapshot = client.fetch_snapshot(EntityId::new(42)).await.unwrap();

    assert_eq!(snapshot.id, SnapshotId::new(9));
    assert!(snapshot.hazard_active);
    assert_eq!(snapshot.persons.len(), 2);
    assert_eq!(snapshot.persons[0].status, LifeStatus::Injured);
    assert_eq!(snapshot.persons[1].id, PersonId::new(2));
    assert!(snapshot.persons[1].death_date.is_some());
}

#[tokio::test]
async fn test_accept_persons_body_and_decision() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/accept-person"))
        .and(body_json(json!({ "entity_id": 42, "persons_id": [1, 2, 3] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "accepted": [1, 3], "rejected": [2] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let decision = client
        .accept_persons(
            EntityId::new(42),
            &[PersonId::new(1), PersonId::new(2), PersonId::new(3)],
        )
        .await
        .unwrap();

    assert!(decision.is_accepted(PersonId::new(1)));
    assert!(!decision.is_accepted(PersonId::new(2)));
    assert_eq!(decision.rejected, vec![PersonId::new(2)]);
}

#[tokio::test]
async fn test_outcomes_use_matching_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/service-done"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accepted": [1] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/person-death"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accepted": [2] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let entity = EntityId::new(42);

    let healthy = client
        .report_outcome(entity, DischargeStatus::Healthy, &[PersonId::new(1)])
        .await
        .unwrap();
    let dead = client
        .report_outcome(entity, DischargeStatus::Dead, &[PersonId::new(2)])
        .await
        .unwrap();

    assert!(healthy.is_accepted(PersonId::new(1)));
    assert!(dead.is_accepted(PersonId::new(2)));
    assert!(dead.rejected.is_empty());
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/service-done"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unknown person"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .report_service_done(EntityId::new(1), &[PersonId::new(5)])
        .await
        .unwrap_err();

    match &err {
        GatewayError::Status { status, body } => {
            assert_eq!(*status, 422);
            assert_eq!(body, "unknown person");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/snapshot/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.fetch_snapshot(EntityId::new(1)).await.unwrap_err();

    assert!(matches!(err, GatewayError::Malformed(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_slow_world_model_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/snapshot/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": 1 }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.fetch_snapshot(EntityId::new(1)).await.unwrap_err();

    assert!(matches!(err, GatewayError::Transport(_)));
    assert!(err.is_transient());
}
