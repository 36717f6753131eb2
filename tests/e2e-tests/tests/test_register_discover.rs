//! Registration, discovery and the plain request/response operations over
//! a real HTTP server.

use airfone_client::RegistryApi;
use airfone_common::{ErrorReason, Metadata, ServiceId, ServiceStatus};
use airfone_registry::types::{
    ConformRequest, KeepAliveRequest, LogoutRequest, RegisterRequest, UpdateRequest,
};
use airfone_registry::RegistryConfig;
use e2e_tests::assertions::{assert_placement, Placement};
use e2e_tests::TestRegistry;

fn register_request(topic: &str, port: u16, deps: &[&str]) -> RegisterRequest {
    RegisterRequest {
        topic: topic.to_string(),
        ip: "127.0.0.1".to_string(),
        port,
        metadata: vec![Metadata::new("owner", "e2e")],
        dependency_topics: deps.iter().map(|d| d.to_string()).collect(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_register_and_discover() {
    let server = TestRegistry::start(RegistryConfig::default()).await;
    let client = server.client();

    println!("Step 1: Registering provider...");
    let provider = client.register(register_request("log", 7000, &[])).await.unwrap();
    assert!(provider.id.is_assigned());
    assert_eq!(provider.status, ServiceStatus::Running);
    assert_eq!(provider.metadata, vec![Metadata::new("owner", "e2e")]);

    println!("Step 2: Registering consumer with a dependency on 'log'...");
    let consumer = client.register(register_request("chat", 7100, &["log"])).await.unwrap();
    assert_eq!(consumer.status, ServiceStatus::Changed);
    assert_eq!(consumer.dependencies.len(), 1);
    assert_eq!(consumer.dependencies[0].id, provider.id);
    assert_eq!(consumer.dependencies[0].address(), "127.0.0.1:7000");

    println!("Step 3: Conforming and heartbeating...");
    client
        .conform(ConformRequest {
            topic: "chat".to_string(),
            id: consumer.id,
        })
        .await
        .unwrap();
    let heartbeat = client
        .keep_alive(KeepAliveRequest {
            topic: "chat".to_string(),
            id: consumer.id,
        })
        .await
        .unwrap();
    assert_eq!(heartbeat.status, ServiceStatus::Running);
    assert!(heartbeat.dependencies.is_empty());

    let topics = client.topics().await.unwrap();
    assert_eq!(topics, vec!["chat".to_string(), "log".to_string()]);
    assert_placement(&client, "chat", consumer.id, Placement::Running)
        .await
        .unwrap();

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_logout_and_error_reasons() {
    let server = TestRegistry::start(RegistryConfig::default()).await;
    let client = server.client();

    let service = client.register(register_request("log", 7000, &[])).await.unwrap();
    let logout = LogoutRequest {
        topic: "log".to_string(),
        id: service.id,
    };
    client.logout(logout.clone()).await.unwrap();

    let err = client.logout(logout).await.unwrap_err();
    assert_eq!(err.reason(), ErrorReason::InvalidDelete);

    let heartbeat = client
        .keep_alive(KeepAliveRequest {
            topic: "log".to_string(),
            id: service.id,
        })
        .await
        .unwrap();
    assert_eq!(heartbeat.status, ServiceStatus::Dropped);

    let err = client
        .keep_alive(KeepAliveRequest {
            topic: "unknown".to_string(),
            id: service.id,
        })
        .await
        .unwrap_err();
    assert_eq!(err.reason(), ErrorReason::NotFound);

    let err = client
        .update(UpdateRequest::new("log", ServiceId::new(999)))
        .await
        .unwrap_err();
    assert_eq!(err.reason(), ErrorReason::InvalidUpdate);

    let err = client.register(register_request("", 7000, &[])).await.unwrap_err();
    assert_eq!(err.reason(), ErrorReason::Validation);

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_get_distinct_ids() {
    let server = TestRegistry::start(RegistryConfig::default()).await;

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let client = server.client();
            tokio::spawn(async move {
                client
                    .register(register_request("log", 7000 + i, &[]))
                    .await
                    .unwrap()
                    .id
            })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 16);

    server.stop().await.unwrap();
}
