//! Terminal rendering of chat messages.
//!
//! `ChatRenderer` formats a message as a speaker line followed by its text
//! and any attachments. Each persona gets a stable accent color derived
//! from its id.

use console::{Color, style};

use parley_types::chat::{AttachmentKind, ChatMessage, ChatSession};

const PALETTE: [Color; 5] = [
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::Blue,
    Color::Red,
];

/// Terminal renderer for chat messages.
#[derive(Debug, Clone)]
pub struct ChatRenderer {
    user_label: String,
}

impl Default for ChatRenderer {
    fn default() -> Self {
        Self::new("You")
    }
}

impl ChatRenderer {
    pub fn new(user_label: impl Into<String>) -> Self {
        Self {
            user_label: user_label.into(),
        }
    }

    /// Stable accent color for a persona id.
    pub fn persona_color(persona_id: &str) -> Color {
        let hash = persona_id
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        PALETTE[hash % PALETTE.len()]
    }

    /// Render one message, indented for the chat transcript.
    pub fn render_message(&self, message: &ChatMessage) -> String {
        let time = message
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%H:%M");

        let speaker = match (&message.persona, message.is_user) {
            (_, true) => style(self.user_label.clone()).green().bold().to_string(),
            (Some(persona), false) => style(persona.name.clone())
                .fg(Self::persona_color(&persona.id))
                .bold()
                .to_string(),
            (None, false) => style("Studio").bold().to_string(),
        };

        let mut out = format!("  {} {}", speaker, style(time).dim());
        for line in message.text.lines() {
            out.push_str("\n    ");
            out.push_str(line);
        }
        for attachment in &message.attachments {
            let icon = match attachment.kind {
                AttachmentKind::Image => "[image]",
                AttachmentKind::File => "[file]",
            };
            out.push_str(&format!(
                "\n    {} {} {}",
                style(icon).cyan(),
                attachment.name,
                style(format!("({})", human_size(attachment.size_bytes))).dim()
            ));
            out.push_str(&format!("\n      {}", style(&attachment.url).dim().underlined()));
        }
        out
    }

    /// Render a whole session transcript with a header line.
    pub fn render_session(&self, session: &ChatSession) -> String {
        let mut out = format!(
            "  {} {}",
            style(&session.name).bold(),
            style(format!("({} messages)", session.messages.len())).dim()
        );
        for message in &session.messages {
            out.push_str("\n\n");
            out.push_str(&self.render_message(message));
        }
        out
    }
}

/// Human-readable byte size.
pub fn human_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    let b = bytes as f64;
    if b >= MIB {
        format!("{:.1} MB", b / MIB)
    } else if b >= KIB {
        format!("{:.1} KB", b / KIB)
    } else {
        format!("{bytes} B")
    }
}
