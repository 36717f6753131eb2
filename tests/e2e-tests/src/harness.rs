//! Real registry server for end-to-end tests.

use airfone_client::{HttpRegistryClient, RegistryApi};
use airfone_registry::transport::TransportConfig;
use airfone_registry::{Registry, RegistryConfig, RegistryServer};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

static LOGGING: Once = Once::new();

/// Short timing windows so expiry can be observed within a test.
pub fn fast_config() -> RegistryConfig {
    RegistryConfig {
        heartbeat_interval: Duration::from_millis(100),
        valid_window: Duration::from_millis(150),
        pending_threshold: Duration::from_millis(200),
        dropped_threshold: Duration::from_millis(300),
    }
}

fn init_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A registry server running on an ephemeral localhost port.
pub struct TestRegistry {
    addr: SocketAddr,
    registry: Arc<Registry>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<anyhow::Result<()>>>,
}

impl TestRegistry {
    /// Starts a server with the given timing windows.
    pub async fn start(config: RegistryConfig) -> Self {
        init_logging();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read listener address");

        let server = RegistryServer::new(TransportConfig::tcp(addr.port()), config);
        let registry = Arc::clone(server.registry());
        let (stop, stopped) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            server
                .serve_tcp(listener, async move {
                    let _ = stopped.await;
                })
                .await
        });

        let started = Self {
            addr,
            registry,
            stop: Some(stop),
            task: Some(task),
        };
        let client = &started.client();
        assert!(
            wait_until(Duration::from_secs(5), move || client.health()).await,
            "Registry did not become healthy at {}",
            addr
        );
        started
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> HttpRegistryClient {
        HttpRegistryClient::new(self.base_url())
    }

    pub fn api(&self) -> Arc<dyn RegistryApi> {
        Arc::new(self.client())
    }

    /// The server's registry, for looking behind the HTTP API.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Stops the server and waits for it to finish.
    pub async fn stop(mut self) -> anyhow::Result<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.task.take() {
            Some(task) => task.await?,
            None => Ok(()),
        }
    }
}

impl Drop for TestRegistry {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Polls `condition` every 20ms until it holds or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
