//! Slash command parsing for the chat loop.
//!
//! Commands start with `/` and provide in-chat controls for sessions,
//! attachments, quota and help.

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Clear the terminal screen.
    Clear,
    /// Exit the chat.
    Exit,
    /// Start a new session and make it active.
    New,
    /// List sessions.
    List,
    /// Make another session active.
    Switch(String),
    /// Delete a session.
    Delete(String),
    /// Send a file, optionally with a caption.
    Attach { path: String, caption: String },
    /// Show the remaining daily allowance.
    Usage,
    /// Reprint the active session's messages.
    History,
    /// Unknown command or missing argument.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd.to_lowercase(), rest.trim()),
        None => (trimmed.to_lowercase(), ""),
    };

    let required = |name: &str, build: fn(String) -> ChatCommand| {
        if arg.is_empty() {
            ChatCommand::Unknown(format!("{name} requires a session number or ID"))
        } else {
            build(arg.to_string())
        }
    };

    let command = match cmd.as_str() {
        "/help" | "/h" | "/?" => ChatCommand::Help,
        "/clear" | "/cls" => ChatCommand::Clear,
        "/exit" | "/quit" | "/q" => ChatCommand::Exit,
        "/new" => ChatCommand::New,
        "/list" | "/ls" | "/sessions" => ChatCommand::List,
        "/switch" | "/sw" => required("/switch", ChatCommand::Switch),
        "/delete" | "/rm" => required("/delete", ChatCommand::Delete),
        "/attach" | "/file" => match split_path(arg) {
            Some((path, caption)) => ChatCommand::Attach {
                path,
                caption: caption.to_string(),
            },
            None => ChatCommand::Unknown("/attach requires a file path".to_string()),
        },
        "/usage" | "/quota" => ChatCommand::Usage,
        "/history" => ChatCommand::History,
        other => ChatCommand::Unknown(other.to_string()),
    };
    Some(command)
}

/// Split `path [caption]`; a path containing spaces may be double-quoted.
fn split_path(arg: &str) -> Option<(String, &str)> {
    if let Some(rest) = arg.strip_prefix('"') {
        let (path, caption) = rest.split_once('"')?;
        if path.is_empty() {
            return None;
        }
        return Some((path.to_string(), caption.trim()));
    }

    let mut parts = arg.splitn(2, char::is_whitespace);
    let path = parts.next().filter(|p| !p.is_empty())?;
    Some((path.to_string(), parts.next().unwrap_or("").trim()))
}

/// Print the help text listing all available commands.
pub fn print_help() {
    let rows = [
        ("/help", "Show this help message"),
        ("/new", "Start a new session"),
        ("/list", "List sessions (* = active)"),
        ("/switch <n|id>", "Switch to a session from /list"),
        ("/delete <n|id>", "Delete a session"),
        ("/attach <path> [caption]", "Send a file or image"),
        ("/usage", "Show turns left today"),
        ("/history", "Reprint this session"),
        ("/clear", "Clear the screen"),
        ("/exit", "End the chat"),
    ];

    println!();
    println!("  {}", style("Available commands:").bold());
    println!();
    for (cmd, description) in rows {
        println!("  {:<26} {}", style(cmd).cyan(), description);
    }
    println!();
    println!(
        "  {}",
        style("Ctrl+D to exit, Ctrl+C cancels a pending reply").dim()
    );
    println!();
}
