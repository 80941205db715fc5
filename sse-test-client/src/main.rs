use anyhow::Result;
use clap::Parser;
use colored::*;
use secrecy::ExposeSecret;
use session_auth::{Credentials, HttpIssuer, SessionManager};

mod api_client;
mod output;
mod scenarios;

use api_client::ApiClient;
use output::print_test_summary;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "Notification Stream Integration Testing Tool")]
struct Cli {
    /// Base URL of the notification server (e.g., http://localhost:4000)
    #[arg(long)]
    base_url: String,

    /// Base URL of the auth backend; omit to post events unauthenticated
    #[arg(long)]
    auth_url: Option<String>,

    /// Sign-in email, required when --auth-url is given
    #[arg(long)]
    email: Option<String>,

    /// Sign-in password, required when --auth-url is given
    #[arg(long)]
    password: Option<String>,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Test live delivery over a fresh stream connection
    ConnectionTest,
    /// Test replay of events missed while disconnected
    ReplayTest,
    /// Test the polling safety net without a stream
    PollTest,
    /// Run all scenarios
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    let bearer_token = match (&cli.auth_url, &cli.email, &cli.password) {
        (Some(auth_url), Some(email), Some(password)) => {
            println!("{} Signing in...", "→".blue());
            let sessions = SessionManager::new(HttpIssuer::new(auth_url.clone()));
            sessions
                .sign_in(&Credentials {
                    email: email.clone(),
                    password: password.clone(),
                })
                .await?;
            let token = sessions.access_token().await?;
            println!("{} Signed in", "✓".green());
            Some(token.expose_secret().to_string())
        }
        (None, _, _) => None,
        _ => anyhow::bail!("--auth-url requires both --email and --password"),
    };

    let api = ApiClient::new(reqwest::Client::new(), cli.base_url.clone(), bearer_token);

    // Fail fast if the server is not reachable.
    api.get_status().await?;
    println!("{} Server reachable at {}", "✓".green(), cli.base_url);

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();
    match cli.scenario {
        ScenarioChoice::ConnectionTest => {
            results.push(scenarios::test_connection(&api, &cli.base_url).await?);
        }
        ScenarioChoice::ReplayTest => {
            results.push(scenarios::test_replay(&api, &cli.base_url).await?);
        }
        ScenarioChoice::PollTest => {
            results.push(scenarios::test_poll(&api, &cli.base_url).await?);
        }
        ScenarioChoice::All => {
            results.push(scenarios::test_connection(&api, &cli.base_url).await?);
            results.push(scenarios::test_replay(&api, &cli.base_url).await?);
            results.push(scenarios::test_poll(&api, &cli.base_url).await?);
        }
    }

    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
