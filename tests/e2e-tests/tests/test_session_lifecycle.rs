//! Keep-alive sessions against a real server with shortened timing windows.

use airfone_client::{RegistryApi, Session, SessionConfig};
use airfone_common::ServiceStatus;
use airfone_registry::types::{KeepAliveRequest, RegisterRequest};
use airfone_registry::RegistryConfig;
use e2e_tests::assertions::{assert_placement, placement_of, Placement};
use e2e_tests::{fast_config, wait_until, TestRegistry};
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn session_config(topic: &str, port: u16, deps: &[&str]) -> SessionConfig {
    SessionConfig::new(topic, "127.0.0.1", port)
        .with_dependencies(deps.iter().copied())
        .with_heartbeat_interval(fast_config().heartbeat_interval)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_stays_running() {
    let server = TestRegistry::start(fast_config()).await;
    let client = server.client();

    let session = Session::register(server.api(), session_config("log", 7000, &[]))
        .await
        .unwrap();

    println!("Heartbeating through several sweep periods...");
    sleep(Duration::from_secs(1)).await;

    assert_eq!(session.status(), ServiceStatus::Running);
    assert_placement(&client, "log", session.id(), Placement::Running)
        .await
        .unwrap();

    session.logout().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_silent_service_is_demoted_then_evicted() {
    let config = RegistryConfig {
        dropped_threshold: Duration::from_millis(800),
        ..fast_config()
    };
    let server = TestRegistry::start(config).await;
    let client = server.client();

    let service = client
        .register(RegisterRequest {
            topic: "log".to_string(),
            ip: "127.0.0.1".to_string(),
            port: 7000,
            metadata: Vec::new(),
            dependency_topics: Vec::new(),
        })
        .await
        .unwrap();

    let (client, id) = (&client, service.id);
    println!("Waiting for the sweep to demote the silent service...");
    let demoted = wait_until(Duration::from_secs(2), || async move {
        placement_of(client, "log", id).await == Ok(Placement::Pending)
    })
    .await;
    assert!(demoted, "Service {} was never demoted", service.id);

    println!("Waiting for the sweep to evict it...");
    let evicted = wait_until(Duration::from_secs(2), || async move {
        placement_of(client, "log", id).await == Ok(Placement::Absent)
    })
    .await;
    assert!(evicted, "Service {} was never evicted", service.id);

    let heartbeat = client
        .keep_alive(KeepAliveRequest {
            topic: "log".to_string(),
            id: service.id,
        })
        .await
        .unwrap();
    assert_eq!(heartbeat.status, ServiceStatus::Dropped);

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_registers_again_after_eviction() {
    let server = TestRegistry::start(fast_config()).await;
    let client = server.client();

    let session = Session::register(server.api(), session_config("log", 7000, &[]))
        .await
        .unwrap();
    let first_id = session.id();

    server
        .registry()
        .logout("log", Instant::now(), first_id)
        .unwrap();

    let (client, current) = (&client, &session);
    let replaced = wait_until(Duration::from_secs(2), || async move { current.id() != first_id }).await;
    assert!(replaced, "Session never registered again");
    assert_placement(client, "log", first_id, Placement::Absent)
        .await
        .unwrap();

    let settled = wait_until(Duration::from_secs(1), || async move {
        placement_of(client, "log", current.id()).await == Ok(Placement::Running)
    })
    .await;
    assert!(settled, "New registration {} is not running", session.id());

    session.logout().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_consumer_switches_to_live_provider() {
    let server = TestRegistry::start(fast_config()).await;

    println!("Step 1: Starting the first provider and the consumer...");
    let first = Session::register(server.api(), session_config("log", 7000, &[]))
        .await
        .unwrap();
    let consumer = Session::register(server.api(), session_config("chat", 7100, &["log"]))
        .await
        .unwrap();
    let first_id = first.id();
    assert_eq!(consumer.dependency("log").unwrap().id, first_id);

    println!("Step 2: Starting a second provider and silencing the first...");
    let second = Session::register(server.api(), session_config("log", 7001, &[]))
        .await
        .unwrap();
    first.shutdown().await;

    println!("Step 3: Waiting for the consumer to pick the second provider...");
    let (watched, second_id) = (&consumer, second.id());
    let switched = wait_until(Duration::from_secs(3), || async move {
        watched
            .dependency("log")
            .is_some_and(|dependency| dependency.id == second_id)
    })
    .await;
    assert!(switched, "Consumer still uses {:?}", consumer.dependency("log"));
    assert_eq!(consumer.dependency("log").unwrap().address(), "127.0.0.1:7001");

    let running = wait_until(Duration::from_secs(1), || async move {
        watched.status() == ServiceStatus::Running
    })
    .await;
    assert!(running, "Consumer is {}", consumer.status());

    consumer.logout().await.unwrap();
    second.logout().await.unwrap();
    server.stop().await.unwrap();
}
