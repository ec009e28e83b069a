//! Session management CLI commands: list, new, switch, delete, show.
//!
//! Sessions are addressed by their position in the listing (1 = most recently
//! updated) or by ID / unambiguous ID prefix. The same resolution is used by
//! the chat loop's `/switch` and `/delete` commands.

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use uuid::Uuid;

use parley_core::conversation::store::ConversationStore;
use parley_core::storage::kv_store::KvStore;
use parley_types::chat::SessionSummary;

use super::chat::renderer::ChatRenderer;

/// Shortest ID prefix accepted as a session target.
const MIN_PREFIX_LEN: usize = 4;

/// Resolve a user-supplied target against a listing.
pub fn resolve_target(sessions: &[SessionSummary], target: &str) -> Result<Uuid> {
    let target = target.trim();

    if let Some(id) = position(sessions, target) {
        return Ok(id);
    }

    if let Ok(id) = Uuid::parse_str(target) {
        if sessions.iter().any(|s| s.id == id) {
            return Ok(id);
        }
        bail!("Session '{id}' not found");
    }

    if target.len() < MIN_PREFIX_LEN {
        bail!(
            "'{target}' is neither a list position (1-{}) nor a session ID prefix",
            sessions.len()
        );
    }

    let needle = target.to_lowercase();
    let matches: Vec<&SessionSummary> = sessions
        .iter()
        .filter(|s| s.id.to_string().starts_with(&needle))
        .collect();
    match matches.as_slice() {
        [only] => Ok(only.id),
        [] => bail!("No session ID starts with '{target}'"),
        _ => bail!("'{target}' matches {} sessions; use more characters", matches.len()),
    }
}

/// A 1-based list position. Leading zeros and out-of-range numbers are left
/// to the ID prefix lookup, since v7 IDs often start with digits.
fn position(sessions: &[SessionSummary], target: &str) -> Option<Uuid> {
    if target.starts_with('0') {
        return None;
    }
    let index = target.parse::<usize>().ok()?.checked_sub(1)?;
    sessions.get(index).map(|s| s.id)
}

/// Print sessions as a table, marking the active one.
pub fn print_session_table(sessions: &[SessionSummary], active: Option<Uuid>) {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Messages").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
        Cell::new("Last message").fg(Color::White),
    ]);

    for (i, session) in sessions.iter().enumerate() {
        let is_active = active == Some(session.id);
        let name = if is_active {
            Cell::new(format!("{} *", session.name)).fg(Color::Green)
        } else {
            Cell::new(&session.name).fg(Color::Cyan)
        };
        let updated = session
            .updated_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();

        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            name,
            Cell::new(session.message_count).fg(Color::White),
            Cell::new(updated).fg(Color::DarkGrey),
            Cell::new(session.preview.as_deref().unwrap_or("")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!(
        "  {} session{}  {}",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" },
        style("(* = active)").dim()
    );
    println!();
}

/// `parley session list`
pub async fn list_sessions<K: KvStore>(store: &ConversationStore<K>, json: bool) -> Result<()> {
    let sessions = store.list_sessions();

    if json {
        let out = serde_json::json!({
            "active_session_id": store.active_session_id(),
            "sessions": sessions,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_session_table(&sessions, store.active_session_id());
    Ok(())
}

/// `parley session new`
pub async fn new_session<K: KvStore>(store: &mut ConversationStore<K>, json: bool) -> Result<()> {
    let session = store.create_session().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session.summary())?);
    } else {
        println!(
            "  {} Created '{}' and made it active.",
            style("+").green().bold(),
            style(&session.name).cyan()
        );
    }
    Ok(())
}

/// `parley session switch <target>`
pub async fn switch_session<K: KvStore>(
    store: &mut ConversationStore<K>,
    target: &str,
    json: bool,
) -> Result<()> {
    let id = resolve_target(&store.list_sessions(), target)?;
    let session = store.switch_active(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session.summary())?);
    } else {
        println!(
            "  {} Switched to '{}'.",
            style(">").green().bold(),
            style(&session.name).cyan()
        );
    }
    Ok(())
}

/// `parley session delete <target>`
pub async fn delete_session<K: KvStore>(
    store: &mut ConversationStore<K>,
    target: &str,
    force: bool,
    json: bool,
) -> Result<()> {
    let id = resolve_target(&store.list_sessions(), target)?;
    let Some(session) = store.session(&id).cloned() else {
        bail!("Session '{id}' not found");
    };

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete session '{}' ({} messages)?",
                style(&session.name).red().bold(),
                session.messages.len()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let outcome = store.delete_session(id).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "deleted": true,
                "session_id": outcome.deleted,
                "active_session_id": outcome.active_session_id,
                "created_replacement": outcome.created_replacement,
            })
        );
    } else {
        println!(
            "  {} Session '{}' deleted.",
            style("x").red().bold(),
            session.name
        );
        if outcome.created_replacement {
            println!("  {}", style("Started a fresh session.").dim());
        }
    }
    Ok(())
}

/// `parley session show [target]`
pub async fn show_session<K: KvStore>(
    store: &ConversationStore<K>,
    target: Option<&str>,
    json: bool,
) -> Result<()> {
    let id = match target {
        Some(target) => resolve_target(&store.list_sessions(), target)?,
        None => match store.active_session_id() {
            Some(id) => id,
            None => bail!("No active session"),
        },
    };
    let Some(session) = store.session(&id) else {
        bail!("Session '{id}' not found");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(session)?);
    } else {
        println!();
        println!("{}", ChatRenderer::default().render_session(session));
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::conversation::store::SessionSeed;
    use parley_core::storage::memory::MemoryKvStore;

    fn summary(id: Uuid, name: &str) -> SessionSummary {
        SessionSummary {
            id,
            name: name.to_string(),
            message_count: 1,
            updated_at: chrono::Utc::now(),
            preview: None,
        }
    }

    #[test]
    fn resolves_positions_ids_and_prefixes() {
        let a = Uuid::parse_str("0190aaaa-0000-7000-8000-000000000001").unwrap();
        let b = Uuid::parse_str("0190bbbb-0000-7000-8000-000000000002").unwrap();
        let sessions = vec![summary(a, "Chat 2"), summary(b, "Chat 1")];

        assert_eq!(resolve_target(&sessions, "1").unwrap(), a);
        assert_eq!(resolve_target(&sessions, " 2 ").unwrap(), b);
        assert_eq!(resolve_target(&sessions, &b.to_string()).unwrap(), b);
        assert_eq!(resolve_target(&sessions, "0190b").unwrap(), b);
    }

    #[test]
    fn rejects_bad_targets() {
        let a = Uuid::parse_str("0190aaaa-0000-7000-8000-000000000001").unwrap();
        let b = Uuid::parse_str("0190aaab-0000-7000-8000-000000000002").unwrap();
        let sessions = vec![summary(a, "Chat 2"), summary(b, "Chat 1")];

        assert!(resolve_target(&sessions, "0").is_err());
        assert!(resolve_target(&sessions, "3").is_err());
        assert!(resolve_target(&sessions, "01").is_err());
        assert!(resolve_target(&sessions, "0190aaa").is_err(), "ambiguous prefix");
        assert!(resolve_target(&sessions, "ffff").is_err());
        assert!(resolve_target(&sessions, &Uuid::now_v7().to_string()).is_err());
    }

    #[test]
    fn all_digit_prefix_is_an_id_when_not_a_position() {
        let a = Uuid::parse_str("01901234-0000-7000-8000-000000000001").unwrap();
        let b = Uuid::parse_str("01905678-0000-7000-8000-000000000002").unwrap();
        let sessions = vec![summary(a, "Chat 2"), summary(b, "Chat 1")];

        assert_eq!(resolve_target(&sessions, "01901234").unwrap(), a);
        assert_eq!(resolve_target(&sessions, "0190567").unwrap(), b);
        assert_eq!(resolve_target(&sessions, "2").unwrap(), b);
        assert!(resolve_target(&sessions, "1901234").is_err());
    }

    #[tokio::test]
    async fn switch_and_forced_delete_through_commands() {
        let mut store = ConversationStore::load(MemoryKvStore::new(), SessionSeed::default()).await;
        let first = store.active_session_id().unwrap();
        new_session(&mut store, true).await.unwrap();
        assert_ne!(store.active_session_id(), Some(first));

        switch_session(&mut store, "2", true).await.unwrap();
        assert_eq!(store.active_session_id(), Some(first));

        // Switching does not reorder the listing.
        let second = store.list_sessions()[0].id;
        assert_ne!(second, first);
        delete_session(&mut store, &first.to_string(), true, true).await.unwrap();
        assert!(store.session(&first).is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.active_session_id(), Some(second));
    }
}
