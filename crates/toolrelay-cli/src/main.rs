use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use toolrelay_client::{Client, ClientConfig};

mod call_cmd;
mod tools_cmd;

#[derive(Parser)]
#[command(name = "toolrelay", about = "toolrelay CLI - call tools on a toolrelay server")]
struct Cli {
    /// Server base URL
    #[arg(long, env = "TOOLRELAY_URL", default_value = "http://localhost:8000")]
    url: String,

    /// Give up on a call after this many seconds (0 waits forever)
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a tool and print its output
    Call {
        /// Tool name
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,

        /// Message id to tag the call with (random if omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Add two numbers with the server's `add` tool
    Add { a: f64, b: f64 },

    /// List the tools the server exposes
    ListTools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = ClientConfig {
        call_timeout: (cli.timeout_secs > 0).then(|| Duration::from_secs(cli.timeout_secs)),
        ..ClientConfig::default()
    };
    let client = Client::connect(&cli.url, config).await?;
    let session_id = client.wait_ready().await?;
    tracing::info!(session_id = %session_id, "connected to {}", cli.url);

    let outcome = match cli.command {
        Commands::Call { tool, args, id } => call_cmd::run(&client, &tool, &args, id).await,
        Commands::Add { a, b } => {
            call_cmd::run(&client, "add", &serde_json::json!({ "a": a, "b": b }).to_string(), None)
                .await
        }
        Commands::ListTools => tools_cmd::run(&client).await,
    };

    client.close();
    outcome
}
