//! Services whose dependencies are missing wait in `pending` until a
//! provider shows up.

use airfone_client::RegistryApi;
use airfone_common::ServiceStatus;
use airfone_registry::types::{KeepAliveRequest, RegisterRequest, UpdateRequest};
use airfone_registry::RegistryConfig;
use e2e_tests::assertions::{assert_placement, Placement};
use e2e_tests::TestRegistry;

fn register_request(topic: &str, port: u16, deps: &[&str]) -> RegisterRequest {
    RegisterRequest {
        topic: topic.to_string(),
        ip: "127.0.0.1".to_string(),
        port,
        metadata: Vec::new(),
        dependency_topics: deps.iter().map(|d| d.to_string()).collect(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pending_until_provider_registers() {
    let server = TestRegistry::start(RegistryConfig::default()).await;
    let client = server.client();

    println!("Step 1: Registering consumer before any provider exists...");
    let consumer = client.register(register_request("chat", 7100, &["log"])).await.unwrap();
    assert_eq!(consumer.status, ServiceStatus::Pending);
    assert!(consumer.dependencies.is_empty());
    assert_placement(&client, "chat", consumer.id, Placement::Pending)
        .await
        .unwrap();

    println!("Step 2: Registering provider...");
    let provider = client.register(register_request("log", 7000, &[])).await.unwrap();

    println!("Step 3: Heartbeat resolves the dependency...");
    let heartbeat = client
        .keep_alive(KeepAliveRequest {
            topic: "chat".to_string(),
            id: consumer.id,
        })
        .await
        .unwrap();
    assert_eq!(heartbeat.status, ServiceStatus::Changed);
    assert_eq!(heartbeat.dependencies.len(), 1);
    assert_eq!(heartbeat.dependencies[0].id, provider.id);
    assert_placement(&client, "chat", consumer.id, Placement::Running)
        .await
        .unwrap();

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_resurrects_pending_service() {
    let server = TestRegistry::start(RegistryConfig::default()).await;
    let client = server.client();

    let consumer = client.register(register_request("chat", 7100, &["log"])).await.unwrap();
    assert_placement(&client, "chat", consumer.id, Placement::Pending)
        .await
        .unwrap();

    let mut update = UpdateRequest::new("chat", consumer.id);
    update.port = Some(7200);
    let updated = client.update(update).await.unwrap();

    assert_eq!(updated.port, 7200);
    assert_eq!(updated.status, ServiceStatus::Running);
    assert_placement(&client, "chat", consumer.id, Placement::Running)
        .await
        .unwrap();

    let mut update = UpdateRequest::new("chat", consumer.id);
    update.need_dependencies = true;
    update.dependency_topics = vec!["auth".to_string()];
    let updated = client.update(update).await.unwrap();

    assert_eq!(updated.status, ServiceStatus::Pending);
    assert_eq!(updated.dependency_topics, vec!["auth".to_string()]);
    assert_placement(&client, "chat", consumer.id, Placement::Pending)
        .await
        .unwrap();

    server.stop().await.unwrap();
}
