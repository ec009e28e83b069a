//! Reply selection.
//!
//! `select_reply` is a pure function of the persona pool and an RNG: pick a
//! persona uniformly, then one of its candidates uniformly. `ReplyPicker`
//! owns a seeded `StdRng` so a fixed seed reproduces a conversation.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::persona::Persona;

/// Which candidate list to draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Text,
    Attachment,
}

/// A chosen persona and reply text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyChoice {
    pub persona: Persona,
    pub text: &'static str,
}

/// Pick a persona, then a reply of `kind` from its candidates.
///
/// Returns `None` if the pool is empty or the chosen persona has no
/// candidates of that kind.
pub fn select_reply<R: Rng + ?Sized>(
    pool: &[Persona],
    kind: ReplyKind,
    rng: &mut R,
) -> Option<ReplyChoice> {
    let persona = pool.choose(rng)?;
    let candidates = match kind {
        ReplyKind::Text => persona.replies,
        ReplyKind::Attachment => persona.attachment_replies,
    };
    let text = *candidates.choose(rng)?;
    Some(ReplyChoice {
        persona: *persona,
        text,
    })
}

/// Seeded reply source for the turn engine.
pub struct ReplyPicker {
    pool: &'static [Persona],
    rng: StdRng,
}

impl ReplyPicker {
    /// Deterministic picker for a given seed.
    pub fn seeded(pool: &'static [Persona], seed: u64) -> Self {
        Self {
            pool,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Picker seeded from OS entropy.
    pub fn from_entropy(pool: &'static [Persona]) -> Self {
        Self {
            pool,
            rng: StdRng::from_entropy(),
        }
    }

    /// `seeded` when a seed is configured, otherwise `from_entropy`.
    pub fn new(pool: &'static [Persona], seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(pool, seed),
            None => Self::from_entropy(pool),
        }
    }

    pub fn pick(&mut self, kind: ReplyKind) -> Option<ReplyChoice> {
        select_reply(self.pool, kind, &mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::{HOST, PERSONAS};
    use std::collections::HashSet;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = ReplyPicker::seeded(PERSONAS, 42);
        let mut b = ReplyPicker::seeded(PERSONAS, 42);
        for _ in 0..20 {
            assert_eq!(a.pick(ReplyKind::Text), b.pick(ReplyKind::Text));
        }
    }

    #[test]
    fn choice_comes_from_the_chosen_persona() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let choice = select_reply(PERSONAS, ReplyKind::Text, &mut rng).unwrap();
            assert!(choice.persona.replies.contains(&choice.text));

            let ack = select_reply(PERSONAS, ReplyKind::Attachment, &mut rng).unwrap();
            assert!(ack.persona.attachment_replies.contains(&ack.text));
        }
    }

    #[test]
    fn every_persona_eventually_answers() {
        let mut rng = StdRng::seed_from_u64(1);
        let seen: HashSet<&str> = (0..400)
            .filter_map(|_| select_reply(PERSONAS, ReplyKind::Text, &mut rng))
            .map(|c| c.persona.id)
            .collect();
        assert_eq!(seen.len(), PERSONAS.len());
    }

    #[test]
    fn empty_pool_or_candidates_yield_none() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(select_reply(&[], ReplyKind::Text, &mut rng).is_none());
        assert!(select_reply(&[HOST], ReplyKind::Text, &mut rng).is_none());
    }
}
