//! Dual-guess reconciliation.
//!
//! Each participant guesses the other's real name. A chat is revealed only
//! when both stored guesses are correct at the same time. Comparison is exact
//! after case folding and trimming; there is no fuzzy matching.

use tracing::{debug, info, warn};
use uuid::Uuid;

use snugglr_db::models::{GuessSnapshot, NewNotification};
use snugglr_types::api::GuessResponse;
use snugglr_types::events::ServerEvent;
use snugglr_types::models::NotificationKind;

use crate::channels::Channel;
use crate::error::{EngineError, EngineResult};
use crate::Engine;

pub const INCORRECT_MESSAGE: &str = "At least one guess is incorrect. Try again!";
pub const REVEALED_MESSAGE: &str = "Both guesses correct! Identities revealed! 🎉";

pub fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn names_match(guess: &str, name: &str) -> bool {
    normalize_name(guess) == normalize_name(name)
}

/// Outcome of comparing both guesses of a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// The latest guesser named the other participant correctly.
    pub guesser_right: bool,
    /// The other participant named the latest guesser correctly.
    pub other_right: bool,
}

impl Verdict {
    pub fn reveals(&self) -> bool {
        self.guesser_right && self.other_right
    }
}

/// `None` while the other participant has not guessed yet.
pub fn judge(snapshot: &GuessSnapshot) -> Option<Verdict> {
    let other_guess = snapshot.other_guess.as_deref()?;
    Some(Verdict {
        guesser_right: names_match(&snapshot.guess, &snapshot.other_name),
        other_right: names_match(other_guess, &snapshot.guesser_name),
    })
}

impl Engine {
    /// Store `guesser`'s guess for the chat and reconcile it with the other
    /// participant's latest guess.
    pub fn submit_guess(&self, chat_id: Uuid, guesser: Uuid, guess: &str) -> EngineResult<GuessResponse> {
        if guess.trim().is_empty() {
            return Err(EngineError::validation("Please provide chatId and guess"));
        }

        let channel = self.participant_channel(chat_id, guesser)?;
        if channel.revealed {
            return Err(EngineError::AlreadyRevealed);
        }

        // Stored, compared and (if both guesses hold) revealed in one write
        // transaction, so a concurrent guess by the other participant is
        // either fully visible to this decision or decided after it.
        let outcome = self
            .db
            .record_guess(&chat_id.to_string(), &guesser.to_string(), guess, |snapshot| {
                judge(snapshot).is_some_and(|verdict| verdict.reveals())
            })?
            .ok_or(EngineError::AlreadyRevealed)?;
        let snapshot = &outcome.snapshot;

        self.outbox
            .to_chat(chat_id, ServerEvent::GuessSubmitted { chat_id, user_id: guesser });

        let Some(verdict) = judge(snapshot) else {
            debug!("{} guessed in chat {}, waiting for the other side", guesser, chat_id);
            return Ok(GuessResponse { guess_submitted: true, both_guessed: false, revealed: false });
        };

        if !outcome.revealed {
            debug!("chat {} guesses do not both match: {:?}", chat_id, verdict);
            self.outbox.to_chat(
                chat_id,
                ServerEvent::GuessIncorrect { chat_id, message: INCORRECT_MESSAGE.to_string() },
            );
            return Ok(GuessResponse { guess_submitted: true, both_guessed: true, revealed: false });
        }

        info!("Identities revealed in chat {}", chat_id);
        self.announce_reveal(&channel, snapshot);

        Ok(GuessResponse { guess_submitted: true, both_guessed: true, revealed: true })
    }

    fn announce_reveal(&self, channel: &Channel, snapshot: &GuessSnapshot) {
        let pairs = [
            (&snapshot.guesser_id, &snapshot.other_id, &snapshot.other_name),
            (&snapshot.other_id, &snapshot.guesser_id, &snapshot.guesser_name),
        ];
        for (recipient, sender, sender_name) in pairs {
            self.notify(NewNotification {
                recipient: recipient.clone(),
                sender: Some(sender.clone()),
                kind: NotificationKind::IdentityRevealed.as_str().to_string(),
                title: "Identities Revealed! 🎉".to_string(),
                message: format!("You and {} guessed correctly!", sender_name),
                related_chat: Some(snapshot.chat_id.clone()),
                related_match: Some(channel.match_id.to_string()),
                related_message: None,
                action_url: Some(format!("/chat/{}", snapshot.chat_id)),
            });
        }

        match self.revealed_users(channel) {
            Ok(users) => self.outbox.to_chat(
                channel.id,
                ServerEvent::RevealIdentity {
                    chat_id: channel.id,
                    revealed: true,
                    users,
                    message: REVEALED_MESSAGE.to_string(),
                },
            ),
            Err(e) => warn!("Chat {} revealed but reveal event not sent: {}", channel.id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use snugglr_types::events::ServerEvent;
    use snugglr_types::models::NotificationKind;
    use uuid::Uuid;

    use super::*;
    use crate::outbox::Outbound;
    use crate::testing::Harness;

    fn setup() -> (Harness, Uuid, Uuid, Uuid) {
        let mut h = Harness::new();
        let alex = h.user("Alex", "male");
        let sam = h.user("Sam", "female");
        let chat_id = h.matched(alex, sam);
        h.drain();
        (h, alex, sam, chat_id)
    }

    fn revealed_notifications(events: &[Outbound]) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = events
            .iter()
            .filter_map(|o| match o {
                Outbound::User { user_id, event: ServerEvent::NewNotification(n) }
                    if n.kind == NotificationKind::IdentityRevealed =>
                {
                    Some(*user_id)
                }
                _ => None,
            })
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_name("  Alex "), "alex");
        assert!(names_match("SAM", "sam"));
        assert!(!names_match("Samantha", "Sam"));
        assert!(!names_match("Sam", "Sam Lee"));
    }

    #[test]
    fn test_first_guess_waits_for_other() {
        let (mut h, alex, _sam, chat_id) = setup();

        let res = h.engine.submit_guess(chat_id, alex, "sam").unwrap();
        assert_eq!(res, GuessResponse { guess_submitted: true, both_guessed: false, revealed: false });

        let events = h.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            Outbound::Chat { event: ServerEvent::GuessSubmitted { user_id, .. }, .. } if *user_id == alex
        ));
        assert!(!h.engine.get_channel(chat_id).unwrap().revealed);
    }

    #[test]
    fn test_both_correct_reveals() {
        let (mut h, alex, sam, chat_id) = setup();

        h.engine.submit_guess(chat_id, alex, "sam").unwrap();
        let res = h.engine.submit_guess(chat_id, sam, "Alex ").unwrap();
        assert_eq!(res, GuessResponse { guess_submitted: true, both_guessed: true, revealed: true });
        assert!(h.engine.get_channel(chat_id).unwrap().revealed);

        let events = h.drain();
        let mut expected = vec![alex, sam];
        expected.sort();
        assert_eq!(revealed_notifications(&events), expected);

        let reveal = events.iter().find_map(|o| match o {
            Outbound::Chat { event: ServerEvent::RevealIdentity { users, revealed, .. }, .. } => {
                Some((users.clone(), *revealed))
            }
            _ => None,
        });
        let (users, revealed) = reveal.expect("reveal_identity broadcast");
        assert!(revealed);
        assert_eq!(users.len(), 2);
    }

    #[test]
    fn test_partial_correctness_keeps_guesses() {
        let (mut h, alex, sam, chat_id) = setup();

        h.engine.submit_guess(chat_id, alex, "Samantha").unwrap();
        let res = h.engine.submit_guess(chat_id, sam, "Alex").unwrap();
        assert_eq!(res, GuessResponse { guess_submitted: true, both_guessed: true, revealed: false });

        let events = h.drain();
        assert!(events.iter().any(|o| matches!(o.event(), ServerEvent::GuessIncorrect { .. })));
        assert!(revealed_notifications(&events).is_empty());

        let db = h.engine.db();
        assert_eq!(db.get_guess(&chat_id.to_string(), &alex.to_string()).unwrap().as_deref(), Some("Samantha"));
        assert_eq!(db.get_guess(&chat_id.to_string(), &sam.to_string()).unwrap().as_deref(), Some("Alex"));

        // Only the wrong side resubmits
        let res = h.engine.submit_guess(chat_id, alex, "Sam").unwrap();
        assert!(res.revealed);
        assert_eq!(revealed_notifications(&h.drain()).len(), 2);
    }

    #[test]
    fn test_reveal_is_symmetric_in_order() {
        for alex_first in [true, false] {
            let (h, alex, sam, chat_id) = setup();
            let submit = |who: Uuid, guess: &str| h.engine.submit_guess(chat_id, who, guess).unwrap();

            let last = if alex_first {
                submit(alex, "Sam");
                submit(sam, "alex")
            } else {
                submit(sam, "alex");
                submit(alex, "Sam")
            };
            assert!(last.revealed);
        }
    }

    #[test]
    fn test_one_sided_correct_never_reveals() {
        let (h, alex, sam, chat_id) = setup();

        h.engine.submit_guess(chat_id, alex, "Sam").unwrap();
        let res = h.engine.submit_guess(chat_id, sam, "Alexander").unwrap();
        assert!(res.both_guessed && !res.revealed);

        // Repeating the same wrong guess changes nothing
        let res = h.engine.submit_guess(chat_id, sam, "Alexander").unwrap();
        assert!(!res.revealed);
        assert!(!h.engine.get_channel(chat_id).unwrap().revealed);
    }

    #[test]
    fn test_guess_after_reveal_is_rejected() {
        let (mut h, alex, sam, chat_id) = setup();
        h.engine.submit_guess(chat_id, alex, "Sam").unwrap();
        h.engine.submit_guess(chat_id, sam, "Alex").unwrap();
        h.drain();

        for guess in ["Sam", "wrong", "Sam"] {
            let err = h.engine.submit_guess(chat_id, alex, guess).unwrap_err();
            assert!(matches!(err, EngineError::AlreadyRevealed));
        }
        assert!(h.engine.get_channel(chat_id).unwrap().revealed);
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_outsider_is_forbidden() {
        let (h, _alex, _sam, chat_id) = setup();
        let kim = h.user("Kim", "female");

        let err = h.engine.submit_guess(chat_id, kim, "Sam").unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
        assert!(h.engine.db().get_guess(&chat_id.to_string(), &kim.to_string()).unwrap().is_none());
    }

    #[test]
    fn test_blank_guess_is_invalid() {
        let (h, alex, _sam, chat_id) = setup();
        let err = h.engine.submit_guess(chat_id, alex, "   ").unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_replaced_guess_blocks_reveal() {
        let (mut h, alex, sam, chat_id) = setup();

        h.engine.submit_guess(chat_id, alex, "Sam").unwrap();
        h.engine.submit_guess(chat_id, alex, "Wrong").unwrap();
        let res = h.engine.submit_guess(chat_id, sam, "Alex").unwrap();

        assert!(res.both_guessed && !res.revealed);
        assert!(!h.engine.get_channel(chat_id).unwrap().revealed);
        assert!(revealed_notifications(&h.drain()).is_empty());
    }

    #[test]
    fn test_racing_resubmission_never_reveals_on_stale_guess() {
        for _ in 0..20 {
            let (mut h, alex, sam, chat_id) = setup();
            let engine = Arc::new(h.engine.clone());

            let alex_thread = {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    for guess in ["Sam", "Wrong"] {
                        // Rejected once the chat is revealed
                        let _ = engine.submit_guess(chat_id, alex, guess);
                    }
                })
            };
            let sam_thread = {
                let engine = engine.clone();
                std::thread::spawn(move || engine.submit_guess(chat_id, sam, "Alex").unwrap())
            };
            alex_thread.join().unwrap();
            let sam_res = sam_thread.join().unwrap();

            // Revealed exactly when the guesses on file are both correct
            let db = h.engine.db();
            let alex_guess = db.get_guess(&chat_id.to_string(), &alex.to_string()).unwrap();
            let revealed = h.engine.get_channel(chat_id).unwrap().revealed;
            assert_eq!(revealed, alex_guess.as_deref() == Some("Sam"));
            if !revealed {
                assert!(!sam_res.revealed);
            }

            let reveals = revealed_notifications(&h.drain()).len();
            assert_eq!(reveals, if revealed { 2 } else { 0 });
        }
    }

    #[test]
    fn test_concurrent_correct_guesses_reveal_once() {
        for _ in 0..20 {
            let (mut h, alex, sam, chat_id) = setup();
            let engine = Arc::new(h.engine.clone());

            let handles: Vec<_> = [(alex, "Sam"), (sam, "Alex")]
                .into_iter()
                .map(|(who, guess)| {
                    let engine = engine.clone();
                    std::thread::spawn(move || engine.submit_guess(chat_id, who, guess))
                })
                .collect();
            let results: Vec<_> = handles.into_iter().map(|t| t.join().unwrap()).collect();

            // The later writer always sees the earlier guess and reveals
            assert!(results.iter().any(|r| matches!(r, Ok(res) if res.revealed)));
            assert!(h.engine.get_channel(chat_id).unwrap().revealed);
            assert_eq!(revealed_notifications(&h.drain()).len(), 2);
        }
    }
}
