use uuid::Uuid;

use snugglr_types::models::{Profile, PublicUser};

use crate::convert::{profile, public_user};
use crate::error::EngineResult;
use crate::{Engine, eligibility};

const CANDIDATE_LIMIT: usize = 20;
const CANDIDATE_SCAN: u32 = 200;

impl Engine {
    pub fn profile(&self, user_id: Uuid) -> EngineResult<Profile> {
        profile(&self.require_user(user_id)?)
    }

    /// Swipe candidates: same community, no edge with the caller in either
    /// direction, eligible under the gender rule. No ranking.
    pub fn candidates(&self, user_id: Uuid) -> EngineResult<Vec<PublicUser>> {
        let me = self.require_user(user_id)?;

        self.db
            .unswiped_users(&me.id, &me.community, CANDIDATE_SCAN)?
            .iter()
            .filter(|other| eligibility::eligible(&me, other))
            .take(CANDIDATE_LIMIT)
            .map(public_user)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use snugglr_types::models::SwipeAction;

    use crate::testing::Harness;

    #[test]
    fn test_candidates_filter() {
        let h = Harness::new();
        let alex = h.user("Alex", "male");
        let sam = h.user("Sam", "female");
        let kim = h.user("Kim", "female");
        let robin = h.user("Robin", "other");
        let _bob = h.user("Bob", "male");
        let _far = h.user_in("Far", "female", "elsewhere");

        h.engine.swipe(kim, alex, SwipeAction::Like).unwrap();

        let mut ids: Vec<_> = h.engine.candidates(alex).unwrap().into_iter().map(|u| u.id).collect();
        ids.sort();
        let mut expected = vec![sam, robin];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_community_match_ignores_case() {
        let h = Harness::new();
        let alex = h.user_in("Alex", "male", "campus");
        let sam = h.user_in("Sam", "female", "Campus");

        let ids: Vec<_> = h.engine.candidates(alex).unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![sam]);
        // The like gate agrees with the feed
        h.engine.swipe(alex, sam, SwipeAction::Like).unwrap();
    }

    #[test]
    fn test_profile() {
        let h = Harness::new();
        let alex = h.user("Alex", "male");
        let profile = h.engine.profile(alex).unwrap();
        assert_eq!(profile.name, "Alex");
        assert_eq!(profile.community, "campus");
    }
}
