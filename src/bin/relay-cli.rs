use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Command-line client for the transfer relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show relay status and cached balance
    Status,
    /// Read the relay account balance
    Balance,
    /// Liveness check
    Health,
    /// Send ETH from the relay account
    Transfer {
        /// Amount in ETH; the relay default when omitted
        #[arg(short, long)]
        amount: Option<String>,
        /// Destination address; the relay fallback when omitted
        #[arg(short, long)]
        to: Option<String>,
        /// Route to post to
        #[arg(long, default_value = "/convert")]
        route: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/status", base)).send().await?,
        Commands::Balance => client.get(format!("{}/balance", base)).send().await?,
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
        Commands::Transfer { amount, to, route } => {
            let mut body = Map::new();
            if let Some(amount) = amount {
                body.insert("amountETH".to_string(), Value::String(amount));
            }
            if let Some(to) = to {
                body.insert("to".to_string(), Value::String(to));
            }
            client
                .post(format!("{}{}", base, route))
                .json(&Value::Object(body))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let pretty = serde_json::from_str::<Value>(&text)
        .and_then(|json| serde_json::to_string_pretty(&json))
        .unwrap_or(text);

    if status.is_success() {
        println!("{}", pretty);
        Ok(())
    } else {
        eprintln!("Error: relay returned status {}", status);
        eprintln!("{}", pretty);
        std::process::exit(1);
    }
}
