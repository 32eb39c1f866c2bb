use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "inference-cli")]
#[command(about = "Client for the Iris inference service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// Correlation ID to send as X-Request-ID
    #[arg(short = 'r', long)]
    request_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service readiness
    Health,
    /// Classify one flower
    Predict {
        sepal_length: f64,
        sepal_width: f64,
        petal_length: f64,
        petal_width: f64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(id) = &cli.request_id {
        headers.insert("x-request-id", HeaderValue::from_str(id)?);
    }

    let res = match cli.command {
        Commands::Health => {
            client
                .get(format!("{}/health", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Predict {
            sepal_length,
            sepal_width,
            petal_length,
            petal_width,
        } => {
            client
                .post(format!("{}/predict", cli.url))
                .headers(headers)
                .json(&json!({ "values": [sepal_length, sepal_width, petal_length, petal_width] }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let request_id = res
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    println!("status: {status}");
    println!("x-request-id: {request_id}");

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }

    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
