//! Custom assertions for E2E tests

use airfone_client::HttpRegistryClient;
use airfone_common::ServiceId;

/// Where a service currently sits within its topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Running,
    Pending,
    Absent,
}

/// Looks the service up through the topic endpoint.
pub async fn placement_of(
    client: &HttpRegistryClient,
    topic: &str,
    id: ServiceId,
) -> Result<Placement, String> {
    let view = client
        .topic(topic)
        .await
        .map_err(|e| format!("Failed to read topic '{}': {}", topic, e))?;

    let in_running = view.running.iter().any(|s| s.id == id);
    let in_pending = view.pending.iter().any(|s| s.id == id);

    match (in_running, in_pending) {
        (true, true) => Err(format!(
            "Service {} is in both stores of topic '{}': {:#?}",
            id, topic, view
        )),
        (true, false) => Ok(Placement::Running),
        (false, true) => Ok(Placement::Pending),
        (false, false) => Ok(Placement::Absent),
    }
}

/// Assert that a service sits in the expected store.
pub async fn assert_placement(
    client: &HttpRegistryClient,
    topic: &str,
    id: ServiceId,
    expected: Placement,
) -> Result<(), String> {
    let actual = placement_of(client, topic, id).await?;
    if actual == expected {
        Ok(())
    } else {
        Err(format!(
            "Service {} of topic '{}' is {:?}, expected {:?}",
            id, topic, actual, expected
        ))
    }
}
