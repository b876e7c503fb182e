use super::render::render;
use crate::config::ServerConfig;
use crate::core::DqlError;
use crate::executor::Dispatcher;
use crate::storage::{NamespaceRegistry, TaskStore};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

const WELCOME: &str = "Welcome to dagenie!\nOne DQL statement per line; 'exit' or 'quit' to leave.\n";

/// Line sent after every response. Marks end-of-response and carries the
/// session's namespace.
#[must_use]
pub fn prompt(namespace: &str) -> String {
    format!("dagenie[{namespace}]>\n")
}

/// Namespace out of a prompt line, if `line` is one.
#[must_use]
pub fn parse_prompt(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix("dagenie[")
        .and_then(|rest| rest.strip_suffix("]>"))
}

/// Per-connection state
struct Session {
    namespace: String,
    store: Arc<TaskStore>,
}

pub struct Server {
    registry: Arc<NamespaceRegistry>,
    default_namespace: String,
}

impl Server {
    pub fn new(registry: Arc<NamespaceRegistry>, default_namespace: impl Into<String>) -> Self {
        Self {
            registry,
            default_namespace: default_namespace.into(),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, DqlError> {
        let registry = NamespaceRegistry::with_snapshot_threshold(&config.data_dir, config.snapshot_threshold)?;
        // Make sure the starting namespace exists before the first client shows up
        registry.open_or_create(&config.default_namespace)?;
        Ok(Self::new(Arc::new(registry), config.default_namespace.clone()))
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<NamespaceRegistry> {
        &self.registry
    }

    pub async fn start(&self, addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Accept connections forever, one task per client.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "dagenie server listening");

        loop {
            let (socket, addr) = listener.accept().await?;
            tracing::info!(%addr, "new connection");

            let registry = Arc::clone(&self.registry);
            let namespace = self.default_namespace.clone();

            tokio::spawn(async move {
                if let Err(e) = Self::handle_client(socket, registry, namespace).await {
                    tracing::warn!(%addr, error = %e, "error handling client");
                }
                tracing::info!(%addr, "connection closed");
            });
        }
    }

    async fn handle_client(
        mut socket: TcpStream,
        registry: Arc<NamespaceRegistry>,
        namespace: String,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (reader, mut writer) = socket.split();
        let mut reader = BufReader::new(reader);

        let store = match registry.open_or_create(&namespace) {
            Ok(store) => store,
            Err(e) => {
                writer.write_all(format!("Error: {e}\n").as_bytes()).await?;
                return Err(e.into());
            }
        };
        let mut session = Session { namespace, store };

        writer.write_all(WELCOME.as_bytes()).await?;
        writer.write_all(prompt(&session.namespace).as_bytes()).await?;
        writer.flush().await?;

        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                break;
            }

            let query = line.trim().trim_end_matches(';').trim_end();
            if query.is_empty() {
                writer.write_all(prompt(&session.namespace).as_bytes()).await?;
                writer.flush().await?;
                continue;
            }
            if query.eq_ignore_ascii_case("quit") || query.eq_ignore_ascii_case("exit") {
                writer.write_all(b"Goodbye!\n").await?;
                writer.flush().await?;
                break;
            }

            let response = Self::run_query(&registry, &mut session, query.to_string()).await;
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(prompt(&session.namespace).as_bytes()).await?;
            writer.flush().await?;
        }

        Ok(())
    }

    /// Execute off the async runtime; store access is blocking file IO.
    async fn run_query(registry: &Arc<NamespaceRegistry>, session: &mut Session, query: String) -> String {
        tracing::debug!(namespace = %session.namespace, %query, "received query");

        let registry = Arc::clone(registry);
        let store = Arc::clone(&session.store);
        let outcome = tokio::task::spawn_blocking(move || Dispatcher::execute(&registry, &store, &query)).await;

        match outcome {
            Ok(Ok(outcome)) => {
                if let Some((namespace, store)) = outcome.switch_to {
                    tracing::info!(from = %session.namespace, to = %namespace, "session switched namespace");
                    session.namespace = namespace;
                    session.store = store;
                }
                render(&outcome.result)
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "statement failed");
                format!("Error: {e}\n")
            }
            Err(e) => {
                tracing::error!(error = %e, "query task panicked");
                "Error: internal error\n".to_string()
            }
        }
    }
}
