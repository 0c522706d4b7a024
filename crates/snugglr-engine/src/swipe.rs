use tracing::{debug, info};
use uuid::Uuid;

use snugglr_db::models::{LikeOutcome, NewNotification};
use snugglr_types::api::{MatchSummary, SwipeResponse};
use snugglr_types::models::{NotificationKind, SwipeAction};

use crate::convert::{parse_id, parse_timestamp, public_user};
use crate::error::{EngineError, EngineResult};
use crate::{Engine, eligibility};

impl Engine {
    /// Record a swipe. A like that meets an earlier like from the target
    /// promotes that edge, opens the anonymous chat, and notifies both sides.
    pub fn swipe(&self, actor: Uuid, target: Uuid, action: SwipeAction) -> EngineResult<SwipeResponse> {
        if actor == target {
            return Err(EngineError::validation("Cannot swipe on yourself"));
        }

        if action == SwipeAction::Pass {
            debug!("{} passed on {}", actor, target);
            return Ok(SwipeResponse { matched: false, match_id: None, chat_id: None });
        }

        let actor_row = self.require_user(actor)?;
        let target_row = self.require_user(target)?;
        eligibility::check(&actor_row, &target_row)?;

        match self.db.record_like(&actor_row.id, &target_row.id)? {
            LikeOutcome::Pending { match_id } => {
                debug!("{} liked {}, edge {} pending", actor, target, match_id);
                Ok(SwipeResponse {
                    matched: false,
                    match_id: Some(parse_id(&match_id)?),
                    chat_id: None,
                })
            }
            LikeOutcome::Matched { match_id, chat_id } => {
                info!("{} and {} matched (match {}, chat {})", actor, target, match_id, chat_id);
                self.announce_match(actor, target, &match_id, &chat_id);
                Ok(SwipeResponse {
                    matched: true,
                    match_id: Some(parse_id(&match_id)?),
                    chat_id: Some(parse_id(&chat_id)?),
                })
            }
            LikeOutcome::AlreadyMatched { match_id, chat_id } => {
                debug!("{} liked {} again after matching", actor, target);
                Ok(SwipeResponse {
                    matched: true,
                    match_id: Some(parse_id(&match_id)?),
                    chat_id: Some(parse_id(&chat_id)?),
                })
            }
        }
    }

    fn announce_match(&self, actor: Uuid, target: Uuid, match_id: &str, chat_id: &str) {
        for (recipient, sender) in [(actor, target), (target, actor)] {
            self.notify(NewNotification {
                recipient: recipient.to_string(),
                sender: Some(sender.to_string()),
                kind: NotificationKind::NewMatch.as_str().to_string(),
                title: "It's a Match! 🎉".to_string(),
                message: "You have a new match! Start chatting now.".to_string(),
                related_chat: Some(chat_id.to_string()),
                related_match: Some(match_id.to_string()),
                related_message: None,
                action_url: Some(format!("/chat/{}", chat_id)),
            });
        }
    }

    /// Mutual matches of `user`, restricted to partners that still pass the
    /// eligibility rule.
    pub fn matches(&self, user: Uuid) -> EngineResult<Vec<MatchSummary>> {
        let me = self.require_user(user)?;

        self.db
            .matched_partners(&me.id)?
            .iter()
            .filter(|row| eligibility::eligible(&me, &row.partner))
            .map(|row| -> EngineResult<MatchSummary> {
                Ok(MatchSummary {
                    match_id: parse_id(&row.match_id)?,
                    chat_id: row.chat_id.as_deref().map(parse_id).transpose()?,
                    user: public_user(&row.partner)?,
                    matched_at: parse_timestamp(&row.matched_at)?,
                })
            })
            .collect()
    }
}
