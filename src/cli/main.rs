use clap::{Parser, Subcommand};
use reqwest::Client;
use std::error::Error;

#[derive(Parser)]
#[command(name = "oai-index-cli")]
#[command(about = "Search index administration CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a full rebuild of the search index
    Reindex {
        /// Poll the status report until the job ends
        #[arg(short, long)]
        wait: bool,

        /// Poll interval in seconds when waiting
        #[arg(short, long, default_value = "5")]
        interval: u64,
    },

    /// Cancel the running rebuild
    Stop {
        #[arg(short, long)]
        attempts: Option<u32>,

        #[arg(short, long)]
        delay_ms: Option<u64>,
    },

    /// Print the rebuild status report
    Status,

    /// Page through indexed identifiers
    Search {
        #[arg(short, long, default_value = "oai_dc")]
        format: String,

        #[arg(short, long, default_value = "100")]
        rows: usize,

        #[arg(short, long)]
        set: Option<String>,

        /// RFC 3339 lower datestamp bound
        #[arg(long)]
        from: Option<String>,

        /// RFC 3339 upper datestamp bound
        #[arg(long)]
        until: Option<String>,

        /// Resume after this identifier
        #[arg(short, long)]
        cursor: Option<String>,

        /// Follow cursors until the last page
        #[arg(short, long)]
        all: bool,
    },

    /// Check server health
    Health,
}

async fn print_json(response: reqwest::Response) -> Result<(), Box<dyn Error>> {
    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        return Err(format!("Server returned {}", status).into());
    }
    Ok(())
}

async fn fetch_status(client: &Client, endpoint: &str) -> Result<String, Box<dyn Error>> {
    let response = client
        .get(format!("{}/v1/admin/reindex/status", endpoint))
        .send()
        .await?;
    Ok(response.error_for_status()?.text().await?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Reindex { wait, interval } => {
            let response = client
                .post(format!("{}/v1/admin/reindex", cli.endpoint))
                .send()
                .await?;
            let body: serde_json::Value = response.error_for_status()?.json().await?;
            let accepted = body["accepted"].as_bool().unwrap_or(false);

            if !accepted {
                println!("Reindex rejected: a job is already running");
                println!("{}", fetch_status(&client, &cli.endpoint).await?);
                return Ok(());
            }
            println!("Reindex accepted");

            if wait {
                loop {
                    tokio::time::sleep(std::time::Duration::from_secs(interval.max(1))).await;
                    let report = fetch_status(&client, &cli.endpoint).await?;
                    println!("{}\n", report);
                    if report.lines().any(|line| line.starts_with("Started:") && !line.ends_with("ended: -")) {
                        break;
                    }
                }
            }
        }

        Commands::Stop { attempts, delay_ms } => {
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(attempts) = attempts {
                query.push(("attempts", attempts.to_string()));
            }
            if let Some(delay_ms) = delay_ms {
                query.push(("delay_ms", delay_ms.to_string()));
            }

            let response = client
                .post(format!("{}/v1/admin/reindex/stop", cli.endpoint))
                .query(&query)
                .send()
                .await?;
            print_json(response).await?;
        }

        Commands::Status => {
            println!("{}", fetch_status(&client, &cli.endpoint).await?);
        }

        Commands::Search {
            format,
            rows,
            set,
            from,
            until,
            cursor,
            all,
        } => {
            let mut token = cursor;
            loop {
                let mut query: Vec<(&str, String)> = vec![
                    ("format", format.clone()),
                    ("rows", rows.to_string()),
                ];
                if let Some(ref set) = set {
                    query.push(("set", set.clone()));
                }
                if let Some(ref from) = from {
                    query.push(("fromDate", from.clone()));
                }
                if let Some(ref until) = until {
                    query.push(("untilDate", until.clone()));
                }
                if let Some(ref token) = token {
                    query.push(("cursorToken", token.clone()));
                }

                let response = client
                    .get(format!("{}/v1/search", cli.endpoint))
                    .query(&query)
                    .send()
                    .await?;
                if !response.status().is_success() {
                    return print_json(response).await;
                }

                let body: serde_json::Value = response.json().await?;
                if let Some(ids) = body["data"].as_array() {
                    for id in ids.iter().filter_map(|id| id.as_str()) {
                        println!("{}", id);
                    }
                }
                eprintln!(
                    "size={} total={}",
                    body["size"].as_u64().unwrap_or(0),
                    body["total"].as_u64().unwrap_or(0)
                );

                token = body["lastItemId"].as_str().map(str::to_string);
                if !all || token.is_none() {
                    if let Some(ref token) = token {
                        eprintln!("next cursor: {}", token);
                    }
                    break;
                }
            }
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?;
            print_json(response).await?;
        }
    }

    Ok(())
}
