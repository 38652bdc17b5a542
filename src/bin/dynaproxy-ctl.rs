use std::process::ExitCode;

use clap::{Parser, Subcommand};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "dynaproxy-ctl")]
#[command(about = "Control client for a running dynaproxy daemon", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:12333")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status and request statistics
    Status,
    /// List tables known to the backend
    ListTables {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        start: Option<String>,
    },
    /// Check (or wait for) a table status
    TableStatus {
        table: String,
        #[arg(long, default_value = "ACTIVE")]
        status: String,
        #[arg(long)]
        poll: bool,
    },
    /// Forward a raw request body for any operation
    Raw {
        operation: String,
        #[arg(default_value = "{}")]
        body: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Status => client.get(format!("{base}/Status")).send().await?,
        Commands::ListTables { limit, start } => {
            let mut query = Vec::new();
            if let Some(limit) = limit {
                query.push(("Limit", limit.to_string()));
            }
            if let Some(start) = start {
                query.push(("ExclusiveStartTableName", start));
            }
            client
                .get(format!("{base}/ListTables"))
                .query(&query)
                .send()
                .await?
        }
        Commands::TableStatus { table, status, poll } => {
            let table = utf8_percent_encode(&table, NON_ALPHANUMERIC);
            let poll = if poll { "1" } else { "0" };
            client
                .get(format!("{base}/StatusTable/{table}"))
                .query(&[("status", status.as_str()), ("poll", poll)])
                .send()
                .await?
        }
        Commands::Raw { operation, body } => {
            let operation = utf8_percent_encode(&operation, NON_ALPHANUMERIC);
            client
                .post(format!("{base}/RawPost/{operation}"))
                .body(body)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: daemon returned status {status}");
        eprintln!("Response: {}", text.trim_end());
        return Ok(false);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text.trim_end()),
    }
    Ok(true)
}
