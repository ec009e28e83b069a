//! Welcome banner display for chat sessions.

use console::style;

use parley_types::quota::UsageSnapshot;

use crate::cli::usage::usage_line;

/// Print the welcome banner at the start of a chat.
///
/// `usage` is `None` when the quota server could not be reached; the chat
/// still starts and each turn reports its own quota errors.
pub fn print_welcome_banner(session_name: &str, mode: &str, usage: Option<&UsageSnapshot>) {
    println!();
    println!("  {}", style("Parley").cyan().bold());
    println!("  {}", style("Chat with the studio desk").dim());
    println!();
    println!("  {}  {}", style("Session:").bold(), style(session_name).dim());
    println!("  {}     {}", style("Mode:").bold(), style(mode).dim());
    match usage {
        Some(usage) => println!("  {}    {}", style("Quota:").bold(), usage_line(usage)),
        None => println!(
            "  {}    {}",
            style("Quota:").bold(),
            style("unknown (server unreachable)").yellow()
        ),
    }
    println!();
    println!("  {}", style("Type /help for commands, Ctrl+D to exit").dim());
    println!("  {}", style("---").dim());
    println!();
}
