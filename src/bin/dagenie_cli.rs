use ::config::{Config, Environment, File};
use clap::Parser;
use dagenie::network::parse_prompt;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde::Deserialize;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// dagenie interactive client
#[derive(Parser, Debug)]
#[command(name = "dagenie-cli")]
#[command(about = "Interactive DQL shell for a dagenie server", long_about = None)]
struct Args {
    /// Server host
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Server port
    #[arg(short = 'p', long)]
    port: Option<u16>,
}

/// Client configuration
#[derive(Debug, Deserialize)]
struct ClientConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 9090 }

impl ClientConfig {
    /// Priority: CLI args > ENV > config file > defaults
    fn load(args: &Args) -> Self {
        let mut builder = Config::builder();
        if let Some(path) = dagenie::config::CONFIG_PATHS.iter().map(Path::new).find(|p| p.exists()) {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix("DAGENIE").try_parsing(true));

        let base = builder
            .build()
            .ok()
            .and_then(|c| c.try_deserialize::<Self>().ok())
            .unwrap_or_else(|| Self {
                host: default_host(),
                port: default_port(),
            });

        Self {
            host: args.host.clone().unwrap_or(base.host),
            port: args.port.unwrap_or(base.port),
        }
    }
}

/// Connection to the server plus the namespace taken from its last prompt.
struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    namespace: String,
}

impl Connection {
    async fn connect(addr: &str) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        let mut conn = Self {
            reader: BufReader::new(reader),
            writer,
            namespace: String::new(),
        };
        // Welcome banner ends with the first prompt
        if !conn.read_response().await? {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            ));
        }
        Ok(conn)
    }

    /// Print response lines until the prompt. Returns false if the server
    /// closed the connection instead.
    async fn read_response(&mut self) -> std::io::Result<bool> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(false);
            }
            if let Some(namespace) = parse_prompt(&line) {
                self.namespace = namespace.to_string();
                return Ok(true);
            }
            print!("{line}");
        }
    }

    async fn send(&mut self, query: &str) -> std::io::Result<bool> {
        self.writer.write_all(query.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        self.read_response().await
    }

    async fn quit(&mut self) -> std::io::Result<()> {
        self.writer.write_all(b"quit\n").await?;
        self.writer.flush().await?;
        // Prints "Goodbye!" then sees EOF
        self.read_response().await?;
        Ok(())
    }
}

/// A statement is complete once its last non-blank character is `;`.
fn is_complete(buffer: &str) -> bool {
    buffer.trim_end().ends_with(';')
}

/// Multi-line input is sent as one line.
fn join_lines(buffer: &str) -> String {
    buffer
        .lines()
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = ClientConfig::load(&args);

    let addr = format!("{}:{}", config.host, config.port);
    println!("Connecting to {addr}...");
    let mut conn = match Connection::connect(&addr).await {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("Connection failed: {e}");
            eprintln!("Is the server running? Start it with: dagenie serve");
            return Err(e.into());
        }
    };

    let mut rl = DefaultEditor::new()?;
    let history_file = dirs::home_dir().map(|mut p| {
        p.push(".dagenie_history");
        p
    });
    if let Some(ref path) = history_file {
        let _ = rl.load_history(path); // Missing on first run
    }

    println!("End statements with ';'. Type 'exit' or 'quit' to leave.\n");

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() {
            format!("dagenie [{}]> ", conn.namespace)
        } else {
            "      ...> ".to_string()
        };

        match rl.readline(&prompt) {
            Ok(input) => {
                let trimmed = input.trim();
                if buffer.is_empty() && trimmed.is_empty() {
                    continue;
                }
                if buffer.is_empty()
                    && (trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit"))
                {
                    conn.quit().await?;
                    break;
                }

                buffer.push_str(trimmed);
                buffer.push('\n');
                if !is_complete(&buffer) {
                    continue;
                }

                let query = join_lines(&buffer);
                buffer.clear();
                let _ = rl.add_history_entry(query.as_str());

                if !conn.send(&query).await? {
                    eprintln!("Connection closed by server");
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C drops the partial statement
                println!("^C");
                buffer.clear();
            }
            Err(ReadlineError::Eof) => {
                conn.quit().await?;
                break;
            }
            Err(err) => {
                eprintln!("Error: {err:?}");
                return Err(err.into());
            }
        }
    }

    if let Some(ref path) = history_file {
        let _ = rl.save_history(path);
    }
    Ok(())
}
