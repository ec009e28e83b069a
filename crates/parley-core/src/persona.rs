//! Built-in responder identities and their canned replies.
//!
//! Replies are never generated; each persona carries a fixed candidate list
//! for text turns and a second list used to acknowledge attachments.

use parley_types::chat::PersonaRef;

/// A display identity with its fixed reply candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persona {
    pub id: &'static str,
    pub name: &'static str,
    pub title: &'static str,
    pub replies: &'static [&'static str],
    pub attachment_replies: &'static [&'static str],
}

impl Persona {
    pub fn to_ref(&self) -> PersonaRef {
        PersonaRef {
            id: self.id.to_string(),
            name: self.name.to_string(),
        }
    }
}

/// Identity used for the introductory message seeded into every new session.
pub const HOST: Persona = Persona {
    id: "host",
    name: "Studio Desk",
    title: "Front desk",
    replies: &[],
    attachment_replies: &[],
};

/// Greeting seeded into every new session.
pub const HOST_GREETING: &str =
    "Hi there! Thanks for stopping by. Ask us anything about our services, past projects, or how we work.";

/// Responders a reply may come from.
pub const PERSONAS: &[Persona] = &[
    Persona {
        id: "mina",
        name: "Mina Park",
        title: "Creative Director",
        replies: &[
            "Great question! Our design process always starts with a discovery workshop so we understand your brand before we sketch anything.",
            "We love projects like that. Could you share a bit more about your audience?",
            "Our portfolio has a few similar case studies. I'd be happy to walk you through them.",
            "Visual identity work usually takes four to six weeks, depending on how many touchpoints you need.",
        ],
        attachment_replies: &[
            "Thanks for the file! I'll take a close look at the visuals and get back to you.",
            "Got it. This gives me a much better sense of the direction you have in mind.",
        ],
    },
    Persona {
        id: "jun",
        name: "Jun Seo",
        title: "Lead Engineer",
        replies: &[
            "From a technical standpoint that is very doable. We typically build on a modern, well-supported stack.",
            "We can integrate with most existing systems. Do you have API documentation we could review?",
            "Performance and accessibility are part of every build, not an afterthought.",
            "We usually ship in two-week iterations so you can see progress early and often.",
        ],
        attachment_replies: &[
            "Received, thanks! I'll review the technical details in this file.",
            "That helps. I'll check it against what we discussed and follow up with questions.",
        ],
    },
    Persona {
        id: "hana",
        name: "Hana Lee",
        title: "Project Manager",
        replies: &[
            "Happy to help! The easiest next step is a short call so we can scope the work together.",
            "Timelines depend on scope, but most engagements run between one and three months.",
            "We keep you in the loop with weekly check-ins and a shared project board.",
            "I can put together a rough estimate once I know a little more about your goals.",
        ],
        attachment_replies: &[
            "Thank you, I've added this to your project notes.",
            "Got the attachment. I'll make sure the whole team sees it.",
        ],
    },
    Persona {
        id: "theo",
        name: "Theo Kim",
        title: "Strategy Lead",
        replies: &[
            "Interesting! What does success look like for you six months from now?",
            "We often start with a quick audit of your current presence to find the biggest opportunities.",
            "Content strategy and design go hand in hand. We plan both from day one.",
            "That's a common challenge. We've helped several clients in a similar spot.",
        ],
        attachment_replies: &[
            "Thanks for sharing. I'll use this as input for our strategy session.",
            "Appreciate it! This is exactly the kind of context that helps us plan.",
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_persona_has_candidates() {
        assert!(!PERSONAS.is_empty());
        for p in PERSONAS {
            assert!(!p.replies.is_empty(), "{} has no replies", p.id);
            assert!(!p.attachment_replies.is_empty(), "{} has no attachment replies", p.id);
        }
    }

    #[test]
    fn persona_ids_are_unique() {
        let mut ids: Vec<&str> = PERSONAS.iter().map(|p| p.id).collect();
        ids.push(HOST.id);
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }
}
