use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use serde_json::{json, Value};

use session_proxy::credentials::parse_credential_file;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for the session proxy", long_about = None)]
struct Cli {
    /// Public origin of the running proxy.
    #[arg(short, long, default_value = "http://localhost:8080", env = "PROXY_PUBLIC_ORIGIN")]
    url: String,

    /// Control API prefix.
    #[arg(long, default_value = "/__proxy")]
    prefix: String,

    /// Name of the account marker cookie.
    #[arg(long, default_value = "proxy_account")]
    cookie_name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available accounts
    Accounts,
    /// Switch to another account, invalidating the previous account's cache
    Switch {
        account: String,
        /// Account currently selected (defaults to guest)
        #[arg(long)]
        from: Option<String>,
    },
    /// Re-fetch the configured refresh paths, bypassing the cache
    Refresh {
        #[arg(long)]
        account: Option<String>,
    },
    /// Parse a captured credential file and report what it contains
    CheckCredential { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let base = format!(
        "{}/{}",
        cli.url.trim_end_matches('/'),
        cli.prefix.trim_matches('/')
    );
    let client = reqwest::Client::new();

    let succeeded = match cli.command {
        Commands::Accounts => {
            let res = client.get(format!("{base}/accounts")).send().await?;
            print_response(res).await?
        }
        Commands::Switch { account, from } => {
            let res = client
                .post(format!("{base}/switch"))
                .headers(marker_headers(&cli.cookie_name, from.as_deref())?)
                .json(&json!({ "account": account }))
                .send()
                .await?;
            print_response(res).await?
        }
        Commands::Refresh { account } => {
            let res = client
                .post(format!("{base}/refresh"))
                .headers(marker_headers(&cli.cookie_name, account.as_deref())?)
                .send()
                .await?;
            print_response(res).await?
        }
        Commands::CheckCredential { file } => match parse_credential_file(&file) {
            Ok(captured) => {
                let fields: Vec<&str> = captured
                    .cookie
                    .split(';')
                    .filter_map(|pair| pair.split_once('=').map(|(name, _)| name.trim()))
                    .filter(|name| !name.is_empty())
                    .collect();
                let report = json!({
                    "file": file.display().to_string(),
                    "cookie_fields": fields,
                    "user_agent": captured.user_agent,
                    "sec_ch_ua": captured.sec_ch_ua.is_some(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
                true
            }
            Err(e) => {
                eprintln!("Error: {e}");
                false
            }
        },
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

fn marker_headers(
    cookie_name: &str,
    account: Option<&str>,
) -> Result<HeaderMap, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    if let Some(account) = account {
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{cookie_name}={account}"))?,
        );
    }
    Ok(headers)
}

/// Print a control API reply; `false` when the API reported a failure.
async fn print_response(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: control API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(false);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    async fn control_api() -> String {
        let app = Router::new()
            .route(
                "/__proxy/switch",
                post(|| async { (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))) }),
            )
            .route(
                "/__proxy/refresh",
                post(|| async { Json(json!({ "refreshed": ["/"], "failed": [] })) }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/__proxy")
    }

    #[tokio::test]
    async fn test_rejected_command_reports_failure() {
        let base = control_api().await;
        let client = reqwest::Client::builder().no_proxy().build().unwrap();

        let res = client.post(format!("{base}/switch")).send().await.unwrap();
        assert!(!print_response(res).await.unwrap());

        let res = client.post(format!("{base}/refresh")).send().await.unwrap();
        assert!(print_response(res).await.unwrap());
    }

    #[test]
    fn test_marker_headers() {
        let headers = marker_headers("proxy_account", Some("demo1")).unwrap();
        assert_eq!(headers[COOKIE], "proxy_account=demo1");
        assert!(marker_headers("proxy_account", None).unwrap().is_empty());
    }
}
