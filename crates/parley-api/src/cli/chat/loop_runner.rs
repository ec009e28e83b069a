//! Main chat loop orchestration.
//!
//! Coordinates the conversation lifecycle: engine wiring, welcome banner,
//! transcript of the active session, input loop with quota-gated turns,
//! slash commands and shutdown.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use parley_core::turn::engine::TurnHandle;
use parley_types::chat::ChatMessage;
use parley_types::config::GlobalConfig;
use parley_types::error::TurnError;

use crate::cli::session::{print_session_table, resolve_target};
use crate::cli::usage::usage_line;
use crate::client::{ChatEngine, ClientOptions, build_engine};

use super::banner::print_welcome_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::renderer::ChatRenderer;

/// Run the interactive chat loop.
pub async fn run_chat(
    data_dir: &Path,
    config: &GlobalConfig,
    options: ClientOptions,
) -> anyhow::Result<()> {
    let engine = build_engine(data_dir, config, &options).await?;
    let renderer = ChatRenderer::default();

    let usage = match engine.usage().await {
        Ok(usage) => Some(usage),
        Err(e) => {
            debug!(error = %e, "Quota lookup failed at startup");
            None
        }
    };
    let active = engine
        .active_session()
        .await
        .context("No active session after loading history")?;

    print_welcome_banner(&active.name, &options.mode_label(config), usage.as_ref());
    print_transcript(&renderer, &active.messages);

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut chat_input, _writer) = ChatInput::new(prompt)
        .map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;

    loop {
        let text = match chat_input.read_line().await {
            InputEvent::Eof => {
                println!("\n  {}", style("Chat ended.").dim());
                break;
            }
            InputEvent::Interrupted => {
                println!("\n  {}", style("Press Ctrl+D to exit, or keep chatting.").dim());
                continue;
            }
            InputEvent::Message(text) => text,
        };
        if text.is_empty() {
            continue;
        }

        if let Some(cmd) = commands::parse(&text) {
            match cmd {
                ChatCommand::Help => commands::print_help(),
                ChatCommand::Clear => chat_input.clear(),
                ChatCommand::Exit => {
                    println!("\n  {}", style("Chat ended.").dim());
                    break;
                }
                ChatCommand::New => match engine.create_session().await {
                    Ok(session) => {
                        println!(
                            "\n  {} Started '{}'.\n",
                            style("+").green().bold(),
                            style(&session.name).cyan()
                        );
                        print_transcript(&renderer, &session.messages);
                    }
                    Err(e) => print_turn_error(&e),
                },
                ChatCommand::List => {
                    let sessions = engine.list_sessions().await;
                    let active = engine.active_session().await.map(|s| s.id);
                    print_session_table(&sessions, active);
                }
                ChatCommand::Switch(target) => switch_to(&engine, &renderer, &target).await,
                ChatCommand::Delete(target) => delete(&engine, &renderer, &target).await,
                ChatCommand::Attach { path, caption } => {
                    attach(&engine, &renderer, Path::new(&path), &caption).await
                }
                ChatCommand::Usage => match engine.usage().await {
                    Ok(usage) => println!("\n  {}\n", usage_line(&usage)),
                    Err(e) => print_turn_error(&e),
                },
                ChatCommand::History => {
                    if let Some(session) = engine.active_session().await {
                        println!();
                        println!("{}", renderer.render_session(&session));
                        println!();
                    }
                }
                ChatCommand::Unknown(cmd_name) => {
                    println!(
                        "\n  {} Unknown command: {}. Type /help for available commands.\n",
                        style("?").yellow().bold(),
                        style(cmd_name).dim()
                    );
                }
            }
            continue;
        }

        match engine.send_text(&text).await {
            Ok(handle) => {
                debug!(turn_id = %handle.turn_id, remaining = handle.usage.remaining_count, "Turn accepted");
                await_reply(&engine, &renderer, handle).await;
            }
            Err(e) => print_turn_error(&e),
        }
    }

    engine.cancel_all();
    info!(pending = engine.pending_turns(), "Chat loop finished");
    Ok(())
}

/// Show a typing spinner until the reply lands, then print it.
///
/// Ctrl+C while waiting cancels the reply; the turn still counts.
async fn await_reply(engine: &ChatEngine, renderer: &ChatRenderer, handle: TurnHandle) {
    let turn_id = handle.turn_id;
    let spinner = typing_spinner();

    let reply = handle.wait();
    tokio::pin!(reply);
    let outcome = tokio::select! {
        outcome = &mut reply => outcome,
        _ = tokio::signal::ctrl_c() => {
            engine.cancel_turn(turn_id);
            reply.await
        }
    };
    spinner.finish_and_clear();

    match outcome {
        Ok(Some(message)) => {
            println!();
            println!("{}", renderer.render_message(&message));
            println!();
        }
        Ok(None) => println!("  {}\n", style("Reply cancelled.").dim()),
        Err(e) => print_turn_error(&e),
    }
}

async fn switch_to(engine: &ChatEngine, renderer: &ChatRenderer, target: &str) {
    let sessions = engine.list_sessions().await;
    let id = match resolve_target(&sessions, target) {
        Ok(id) => id,
        Err(e) => return print_warning(&e.to_string()),
    };
    match engine.switch_session(id).await {
        Ok(session) => {
            println!(
                "\n  {} Switched to '{}'.\n",
                style(">").green().bold(),
                style(&session.name).cyan()
            );
            print_transcript(renderer, &session.messages);
        }
        Err(e) => print_turn_error(&e),
    }
}

async fn delete(engine: &ChatEngine, renderer: &ChatRenderer, target: &str) {
    let sessions = engine.list_sessions().await;
    let id = match resolve_target(&sessions, target) {
        Ok(id) => id,
        Err(e) => return print_warning(&e.to_string()),
    };
    let was_active = engine.active_session().await.map(|s| s.id) == Some(id);
    let name = sessions
        .iter()
        .find(|s| s.id == id)
        .map(|s| s.name.clone())
        .unwrap_or_default();

    match engine.delete_session(id).await {
        Ok(outcome) => {
            println!("\n  {} Session '{}' deleted.", style("x").red().bold(), name);
            if was_active || outcome.created_replacement {
                if let Some(session) = engine.session(outcome.active_session_id).await {
                    println!(
                        "  {} Now in '{}'.\n",
                        style(">").green().bold(),
                        style(&session.name).cyan()
                    );
                    print_transcript(renderer, &session.messages);
                }
            } else {
                println!();
            }
        }
        Err(e) => print_turn_error(&e),
    }
}

async fn attach(engine: &ChatEngine, renderer: &ChatRenderer, path: &Path, caption: &str) {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) => return print_warning(&format!("Could not read {}: {e}", path.display())),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());

    match engine.send_attachment(&name, &data, caption).await {
        Ok(handle) => {
            println!();
            println!("{}", renderer.render_message(&handle.user_message));
            await_reply(engine, renderer, handle).await;
        }
        Err(e) => print_turn_error(&e),
    }
}

fn print_transcript(renderer: &ChatRenderer, messages: &[ChatMessage]) {
    for message in messages {
        println!("{}", renderer.render_message(message));
        println!();
    }
}

fn typing_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message("typing...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn print_warning(message: &str) {
    println!("\n  {} {message}\n", style("!").yellow().bold());
}

fn print_turn_error(error: &TurnError) {
    match error {
        TurnError::EmptyMessage => {}
        TurnError::QuotaExceeded { retry_after_hours } => println!(
            "\n  {} Daily limit reached. Try again in about {} hour{}.\n",
            style("!").yellow().bold(),
            retry_after_hours,
            if *retry_after_hours == 1 { "" } else { "s" }
        ),
        TurnError::QuotaUnavailable(reason) => println!(
            "\n  {} Quota server unavailable: {}\n  {}\n",
            style("!").red().bold(),
            reason,
            style("Start one with `parley serve`, or chat with --local.").dim()
        ),
        other => println!("\n  {} {other}\n", style("!").red().bold()),
    }
}
