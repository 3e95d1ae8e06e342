use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "predictor-cli", version, about = "CLI for the confidential prediction gateway")]
struct Args {
    /// Backend API base URL.
    #[arg(long, env = "PREDICTOR_API", default_value = "http://localhost:3001")]
    api: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encrypt comma-separated numeric inputs.
    Encrypt { data: String },

    /// Decrypt an encrypted result handle.
    Decrypt { ciphertext: String },

    /// Get an AI prediction for a domain.
    Predict {
        #[arg(short, long, default_value = "financial")]
        domain: String,

        /// Comma-separated input values.
        #[arg(short, long, default_value = "50000,2500,7.5")]
        inputs: String,
    },

    /// Fetch market data for a coin id.
    Market { symbol: String },

    /// Fetch current weather for a city.
    Weather { city: String },

    /// Show aggregate service health.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let client = reqwest::Client::new();
    let api = args.api.trim_end_matches('/').to_string();

    match args.command {
        Command::Encrypt { data } => {
            validate_services(&client, &api).await?;
            let inputs = parse_numbers(&data)?;
            let body = post(&client, &api, "/api/encrypt-data", json!({ "data": inputs })).await?;
            println!("{}", serde_json::to_string_pretty(&body["encrypted"])?);
        }
        Command::Decrypt { ciphertext } => {
            validate_services(&client, &api).await?;
            let body = post(
                &client,
                &api,
                "/api/public-decrypt",
                json!({ "ciphertext": ciphertext }),
            )
            .await?;
            println!("decrypted value: {}", body["decryptedValue"]);
        }
        Command::Predict { domain, inputs } => {
            validate_services(&client, &api).await?;
            let parts: Vec<&str> = inputs.split(',').map(str::trim).collect();
            let at = |i: usize| parts.get(i).copied().unwrap_or("0");
            let body = post(
                &client,
                &api,
                "/api/fetch-prediction",
                json!({
                    "domain": domain,
                    "inputs": { "input1": at(0), "input2": at(1), "input3": at(2) },
                }),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&body["prediction"])?);
        }
        Command::Market { symbol } => {
            validate_services(&client, &api).await?;
            let body = get(&client, &api, &format!("/api/fetch-market/{symbol}")).await?;
            println!("{}", serde_json::to_string_pretty(&body["data"])?);
        }
        Command::Weather { city } => {
            validate_services(&client, &api).await?;
            let body = get(&client, &api, &format!("/api/fetch-weather/{city}")).await?;
            println!("{}", serde_json::to_string_pretty(&body["data"])?);
        }
        Command::Health => {
            let body = fetch_health(&client, &api).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            if !body["success"].as_bool().unwrap_or(false) {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Every mutating command checks aggregate health first, the way the demo
/// frontend does, and refuses to continue against a degraded backend.
async fn validate_services(client: &reqwest::Client, api: &str) -> anyhow::Result<()> {
    let body = fetch_health(client, api).await?;
    if !body["success"].as_bool().unwrap_or(false) {
        bail!(
            "service validation failed:\n{}",
            serde_json::to_string_pretty(&body)?
        );
    }
    Ok(())
}

async fn fetch_health(client: &reqwest::Client, api: &str) -> anyhow::Result<Value> {
    let response = client
        .get(format!("{api}/health"))
        .send()
        .await
        .context("backend unreachable - ensure the server is running")?;
    response.json().await.context("parse health response")
}

async fn get(client: &reqwest::Client, api: &str, path: &str) -> anyhow::Result<Value> {
    let response = client.get(format!("{api}{path}")).send().await?;
    expect_success(response).await
}

async fn post(
    client: &reqwest::Client,
    api: &str,
    path: &str,
    body: Value,
) -> anyhow::Result<Value> {
    let response = client.post(format!("{api}{path}")).json(&body).send().await?;
    expect_success(response).await
}

/// Error responses still carry the JSON envelope; surface it verbatim.
async fn expect_success(response: reqwest::Response) -> anyhow::Result<Value> {
    let body: Value = response.json().await.context("parse response body")?;
    if !body["success"].as_bool().unwrap_or(false) {
        bail!("request failed:\n{}", serde_json::to_string_pretty(&body)?);
    }
    Ok(body)
}

fn parse_numbers(raw: &str) -> anyhow::Result<Vec<f64>> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .with_context(|| format!("invalid number '{}'", part.trim()))
        })
        .collect()
}
