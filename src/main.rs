use clap::{Parser, Subcommand, ValueEnum};
use dagenie::config::ServerConfig;
use dagenie::executor::{Dispatcher, DmlExecutor};
use dagenie::network::{render, Server};
use dagenie::parser::InsertStatement;
use dagenie::{NamespaceRegistry, Task};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// dagenie - task DAG store with a SQL-like query language
#[derive(Parser, Debug)]
#[command(name = "dagenie", version)]
#[command(about = "Task DAG store queried through DQL", long_about = None)]
struct Cli {
    /// Root directory holding one sub-directory per namespace
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Namespace to operate on (defaults to the configured one)
    #[arg(short = 'n', long, global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the TCP server
    Serve {
        #[arg(short = 'H', long)]
        host: Option<String>,
        #[arg(short = 'p', long)]
        port: Option<u16>,
    },
    #[command(flatten)]
    Local(LocalCommand),
}

/// Subcommands that open the data directory in-process
#[derive(Subcommand, Debug)]
enum LocalCommand {
    /// Run one DQL statement and print the result
    Query {
        #[arg(long)]
        dql: String,
    },
    /// Insert a task
    Insert {
        #[arg(long)]
        dag: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "{}")]
        payload: String,
        #[arg(long, default_value = "pending")]
        status: String,
        /// Comma-separated ids of tasks this one depends on
        #[arg(long, value_delimiter = ',')]
        deps: Vec<String>,
        #[arg(long, default_value_t = 0)]
        duration: i64,
        #[arg(long, default_value_t = 0)]
        retries: i64,
    },
    /// Delete a task by DAG and id
    Delete {
        #[arg(long)]
        dag: String,
        #[arg(long)]
        id: String,
    },
    /// Walk the tasks downstream of a root task
    Traverse {
        #[arg(long)]
        dag: String,
        #[arg(long)]
        root: String,
        #[arg(long, value_enum, default_value_t = TraverseMode::Dfs)]
        mode: TraverseMode,
    },
    /// Create an empty namespace
    Create { name: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TraverseMode {
    Dfs,
    Bfs,
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_traversal(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks found during traversal.");
        return;
    }
    for task in tasks {
        println!(
            "Task ID={} Name={} Status={} DAGID={}",
            task.id, task.name, task.status, task.dag_id
        );
    }
}

async fn run(cli: Cli, mut config: ServerConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(namespace) = cli.namespace {
        config.default_namespace = namespace;
    }

    let command = match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            let server = Server::from_config(&config)?;
            tracing::info!(data_dir = %config.data_dir.display(), namespace = %config.default_namespace, "starting server");
            server.start(&config.bind_addr()).await?;
            return Ok(());
        }
        Command::Local(command) => command,
    };

    let registry = NamespaceRegistry::with_snapshot_threshold(&config.data_dir, config.snapshot_threshold)?;
    let result = run_local(&registry, &config.default_namespace, command);
    registry.close_all();
    result
}

/// Subcommands that work on the data directory directly.
fn run_local(
    registry: &NamespaceRegistry,
    namespace: &str,
    command: LocalCommand,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match command {
        LocalCommand::Create { name } => {
            registry.create(&name)?;
            println!("Database '{name}' created at {}", registry.data_dir().join(&name).display());
        }
        LocalCommand::Query { dql } => {
            let store = registry.open_or_create(namespace)?;
            let outcome = Dispatcher::execute(registry, &store, &dql)?;
            print!("{}", render(&outcome.result));
        }
        LocalCommand::Insert {
            dag,
            id,
            name,
            payload,
            status,
            deps,
            duration,
            retries,
        } => {
            let store = registry.open_or_create(namespace)?;
            let stmt = InsertStatement {
                table: "dag".to_string(),
                columns: ["id", "name", "status", "payload", "dependencies", "dagid", "duration", "retries"]
                    .map(String::from)
                    .to_vec(),
                values: vec![
                    id,
                    name,
                    status,
                    payload,
                    serde_json::to_string(&deps)?,
                    dag,
                    duration.to_string(),
                    retries.to_string(),
                ],
            };
            print!("{}", render(&DmlExecutor::insert(&store, &stmt)?));
        }
        LocalCommand::Delete { dag, id } => {
            let store = registry.open(namespace)?;
            store.delete(&dag, &id)?;
            println!("Deleted task '{id}' from DAG '{dag}'");
        }
        LocalCommand::Traverse { dag, root, mode } => {
            let store = registry.open(namespace)?;
            println!("Traversing DAG '{dag}' from root '{root}' ({mode:?})");
            let tasks = match mode {
                TraverseMode::Dfs => store.graph().depth_first(&dag, &root),
                TraverseMode::Bfs => store.graph().breadth_first(&dag, &root),
            };
            print_traversal(&tasks);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    init_logging(&config.log);

    if let Err(e) = run(cli, config).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
