use anyhow::Result;
use clap::Parser;
use colored::*;

use testing_tools::output::print_test_summary;
use testing_tools::scenarios;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "Live visitor count stream integration testing tool")]
struct Cli {
    /// Base URL of the backend (e.g., http://localhost:4000)
    #[arg(long)]
    base_url: String,

    /// Test scenario to run
    #[arg(long, value_enum, default_value = "all")]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// A new visitor's first snapshot counts its own connection
    Connection,
    /// Two tabs sharing an identity count as one unique visitor
    MultiTab,
    /// Closing a tab is broadcast to the remaining clients
    Disconnect,
    /// The status endpoint agrees with the stream
    Status,
    /// Run every scenario
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

    let client = reqwest::Client::new();
    let base_url = cli.base_url.trim_end_matches('/').to_string();

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());
    let baseline = scenarios::fetch_status(&client, &base_url).await?;
    println!(
        "{} Server reachable: {} connection(s), {} visitor(s) before testing",
        "✓".green(),
        baseline.total_connections,
        baseline.unique_visitors
    );

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());
    let mut results = Vec::new();

    match cli.scenario {
        ScenarioChoice::Connection => {
            results.push(scenarios::test_connection(&client, &base_url).await?);
        }
        ScenarioChoice::MultiTab => {
            results.push(scenarios::test_multi_tab(&client, &base_url).await?);
        }
        ScenarioChoice::Disconnect => {
            results.push(scenarios::test_disconnect(&client, &base_url).await?);
        }
        ScenarioChoice::Status => {
            results.push(scenarios::test_status(&client, &base_url).await?);
        }
        ScenarioChoice::All => {
            results.push(scenarios::test_connection(&client, &base_url).await?);
            results.push(scenarios::test_multi_tab(&client, &base_url).await?);
            results.push(scenarios::test_disconnect(&client, &base_url).await?);
            results.push(scenarios::test_status(&client, &base_url).await?);
        }
    }

    // Print summary
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
