//! Player roster: registered players and their cumulative scores.
//!
//! Nicknames are the identity key; registration rejects a nickname that
//! is already taken. The roster also remembers, per player, which
//! questions have already had a submission consumed, backing the
//! one-scored-submission-per-question guard in the engine.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;

/// One ranked row in the standings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    /// Player nickname.
    pub nickname: String,
    /// Opaque avatar reference, when the player registered one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Cumulative score.
    pub score: u64,
}

#[derive(Debug)]
struct PlayerEntry {
    avatar: Option<String>,
    score: u64,
    // registration sequence; standings tie-break, earlier first
    joined: u64,
    // question ids with a consumed submission
    answered: HashSet<String>,
}

/// Registered players keyed by nickname.
#[derive(Debug, Default)]
pub struct Roster {
    players: DashMap<String, PlayerEntry>,
    next_seq: AtomicU64,
}

impl Roster {
    /// Creates an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a player.
    ///
    /// Returns `false` without mutating anything when the nickname is
    /// already taken (nicknames match exactly, case-sensitive).
    pub fn register(&self, nickname: &str, avatar: Option<String>) -> bool {
        match self.players.entry(nickname.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let joined = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(PlayerEntry {
                    avatar,
                    score: 0,
                    joined,
                    answered: HashSet::new(),
                });
                true
            }
        }
    }

    /// True when `nickname` is registered.
    #[must_use]
    pub fn contains(&self, nickname: &str) -> bool {
        self.players.contains_key(nickname)
    }

    /// Current player count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// True when no players are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Adds `points` to a player's cumulative score. Unknown nicknames
    /// are a no-op.
    pub fn award(&self, nickname: &str, points: u64) {
        if let Some(mut entry) = self.players.get_mut(nickname) {
            entry.score += points;
        }
    }

    /// Consumes this player's submission slot for `question_id`.
    ///
    /// Returns `true` exactly once per (player, question) pair; repeat
    /// calls and unknown nicknames return `false`.
    pub fn mark_answered(&self, nickname: &str, question_id: &str) -> bool {
        self.players
            .get_mut(nickname)
            .is_some_and(|mut entry| entry.answered.insert(question_id.to_string()))
    }

    /// All players ordered by score descending; equal scores order by
    /// registration sequence, earlier first.
    #[must_use]
    pub fn standings(&self) -> Vec<Standing> {
        let mut rows: Vec<(u64, Standing)> = self
            .players
            .iter()
            .map(|entry| {
                (
                    entry.joined,
                    Standing {
                        nickname: entry.key().clone(),
                        avatar: entry.avatar.clone(),
                        score: entry.score,
                    },
                )
            })
            .collect();
        rows.sort_by(|a, b| b.1.score.cmp(&a.1.score).then(a.0.cmp(&b.0)));
        rows.into_iter().map(|(_, standing)| standing).collect()
    }

    /// Removes every player.
    pub fn clear(&self) {
        self.players.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_duplicate() {
        let roster = Roster::new();
        assert!(roster.register("ada", None));
        assert!(!roster.register("ada", Some("cat.png".into())));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn nicknames_are_case_sensitive() {
        let roster = Roster::new();
        assert!(roster.register("ada", None));
        assert!(roster.register("Ada", None));
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn award_accumulates_and_ignores_unknown() {
        let roster = Roster::new();
        roster.register("ada", None);
        roster.award("ada", 4);
        roster.award("ada", 2);
        roster.award("ghost", 10);
        let standings = roster.standings();
        assert_eq!(standings.len(), 1);
        assert_eq!(standings[0].score, 6);
    }

    #[test]
    fn standings_order_by_score_then_registration() {
        let roster = Roster::new();
        roster.register("ada", None);
        roster.register("brin", None);
        roster.register("curie", None);
        roster.award("ada", 3);
        roster.award("brin", 5);
        roster.award("curie", 3);

        let names: Vec<_> = roster
            .standings()
            .into_iter()
            .map(|s| s.nickname)
            .collect();
        // ada and curie tie at 3; ada registered first
        assert_eq!(names, vec!["brin", "ada", "curie"]);
    }

    #[test]
    fn mark_answered_consumes_once() {
        let roster = Roster::new();
        roster.register("ada", None);
        assert!(roster.mark_answered("ada", "q1"));
        assert!(!roster.mark_answered("ada", "q1"));
        assert!(roster.mark_answered("ada", "q2"));
        assert!(!roster.mark_answered("ghost", "q1"));
    }

    #[test]
    fn clear_removes_everyone() {
        let roster = Roster::new();
        roster.register("ada", None);
        roster.register("brin", None);
        roster.clear();
        assert!(roster.is_empty());
        // nickname is free again after a clear
        assert!(roster.register("ada", None));
    }

    #[test]
    fn standing_serializes_without_null_avatar() {
        let roster = Roster::new();
        roster.register("ada", None);
        let json = serde_json::to_value(roster.standings()).unwrap();
        assert_eq!(json[0]["nickname"], "ada");
        assert!(json[0].get("avatar").is_none());
    }
}
