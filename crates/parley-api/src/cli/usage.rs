//! `parley usage` -- show the remaining daily allowance.

use anyhow::Context;
use console::style;

use parley_core::quota::gate::QuotaGate;
use parley_infra::quota::http_client::HttpQuotaGate;
use parley_types::quota::UsageSnapshot;

/// Query the quota server without consuming a turn.
pub async fn show_usage(server_url: &str, json: bool) -> anyhow::Result<()> {
    let gate = HttpQuotaGate::new(server_url)?;
    let usage = gate
        .peek("cli")
        .await
        .with_context(|| format!("Could not reach quota server at {server_url}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&usage)?);
    } else {
        println!();
        println!("  {}", usage_line(&usage));
        println!("  {}", style(format!("Server: {}", gate.base_url())).dim());
        println!();
    }
    Ok(())
}

/// One-line styled allowance summary, shared with the chat banner.
pub fn usage_line(usage: &UsageSnapshot) -> String {
    let remaining = if usage.remaining_count == 0 {
        style(usage.remaining_count).red().bold()
    } else {
        style(usage.remaining_count).green().bold()
    };
    format!(
        "{} of {} turns left today",
        remaining, usage.total_count
    )
}
