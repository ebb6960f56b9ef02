use anyhow::Result;
use colored::*;
use std::time::{Duration, Instant};

use crate::identity::fresh_visitor;
use crate::output::{print_event, TestResult};
use crate::sse_client::{Connection, Counts};

const WAIT: Duration = Duration::from_secs(5);

/// Current counts from `/status`, used as the baseline each scenario measures
/// its own connections against.
pub async fn fetch_status(client: &reqwest::Client, base_url: &str) -> Result<Counts> {
    let counts = client
        .get(format!("{}/status", base_url))
        .send()
        .await?
        .error_for_status()?
        .json::<Counts>()
        .await?;
    Ok(counts)
}

fn offset(base: Counts, total: usize, unique: usize) -> Counts {
    Counts {
        total_connections: base.total_connections + total,
        unique_visitors: base.unique_visitors + unique,
    }
}

async fn expect_counts(
    scenario: &str,
    connection: &mut Connection,
    expected: Counts,
    start: Instant,
) -> Option<TestResult> {
    match connection.wait_for_counts(|c| *c == expected, WAIT).await {
        Ok(event) => {
            print_event(&connection.label, &event);
            None
        }
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            Some(TestResult::fail(
                scenario,
                format!("Expected {:?}: {}", expected, e),
                start.elapsed(),
            ))
        }
    }
}

pub async fn test_connection(client: &reqwest::Client, base_url: &str) -> Result<TestResult> {
    let start = Instant::now();
    println!("\n{}", "=== TEST: Connection ===".bright_cyan().bold());

    let base = fetch_status(client, base_url).await?;
    println!("{} Opening one stream as a brand-new visitor...", "→".blue());
    let mut tab = Connection::establish(base_url, None, "Visitor A".to_string()).await?;

    let failure = expect_counts("connection", &mut tab, offset(base, 1, 1), start).await;
    tab.close();

    Ok(failure.unwrap_or_else(|| {
        println!("{} Initial snapshot includes the new connection", "✓".green());
        TestResult::pass("connection", start.elapsed())
    }))
}

pub async fn test_multi_tab(client: &reqwest::Client, base_url: &str) -> Result<TestResult> {
    let start = Instant::now();
    println!("\n{}", "=== TEST: Multiple Tabs ===".bright_cyan().bold());

    let base = fetch_status(client, base_url).await?;
    let visitor = fresh_visitor(client, base_url).await?;
    println!(
        "{} Opening two streams as visitor {}...",
        "→".blue(),
        visitor.visitor_id
    );

    let mut tab1 =
        Connection::establish(base_url, Some(&visitor.cookie), "Tab 1".to_string()).await?;
    let mut tab2 =
        Connection::establish(base_url, Some(&visitor.cookie), "Tab 2".to_string()).await?;

    let expected = offset(base, 2, 1);
    let mut failure = expect_counts("multi_tab", &mut tab2, expected, start).await;
    if failure.is_none() {
        failure = expect_counts("multi_tab", &mut tab1, expected, start).await;
    }
    tab1.close();
    tab2.close();

    Ok(failure.unwrap_or_else(|| {
        println!("{} Two tabs counted as one unique visitor", "✓".green());
        TestResult::pass("multi_tab", start.elapsed())
    }))
}

pub async fn test_disconnect(client: &reqwest::Client, base_url: &str) -> Result<TestResult> {
    let start = Instant::now();
    println!("\n{}", "=== TEST: Disconnect ===".bright_cyan().bold());

    let base = fetch_status(client, base_url).await?;
    let visitor_a = fresh_visitor(client, base_url).await?;
    let visitor_b = fresh_visitor(client, base_url).await?;

    let tab_a =
        Connection::establish(base_url, Some(&visitor_a.cookie), "Visitor A".to_string()).await?;
    let mut tab_b =
        Connection::establish(base_url, Some(&visitor_b.cookie), "Visitor B".to_string()).await?;

    if let Some(failure) = expect_counts("disconnect", &mut tab_b, offset(base, 2, 2), start).await {
        tab_a.close();
        tab_b.close();
        return Ok(failure);
    }

    println!("{} Visitor A closing their tab...", "→".blue());
    tab_a.close();

    let failure = expect_counts("disconnect", &mut tab_b, offset(base, 1, 1), start).await;
    tab_b.close();

    Ok(failure.unwrap_or_else(|| {
        println!("{} Remaining visitor saw the decrement", "✓".green());
        TestResult::pass("disconnect", start.elapsed())
    }))
}

pub async fn test_status(client: &reqwest::Client, base_url: &str) -> Result<TestResult> {
    let start = Instant::now();
    println!("\n{}", "=== TEST: Status Endpoint ===".bright_cyan().bold());

    let base = fetch_status(client, base_url).await?;
    let mut tab = Connection::establish(base_url, None, "Visitor S".to_string()).await?;
    let expected = offset(base, 1, 1);

    if let Some(failure) = expect_counts("status", &mut tab, expected, start).await {
        tab.close();
        return Ok(failure);
    }

    let polled = fetch_status(client, base_url).await?;
    tab.close();

    if polled == expected {
        println!("{} /status agrees with the stream", "✓".green());
        Ok(TestResult::pass("status", start.elapsed()))
    } else {
        Ok(TestResult::fail(
            "status",
            format!("Stream showed {:?} but /status returned {:?}", expected, polled),
            start.elapsed(),
        ))
    }
}
