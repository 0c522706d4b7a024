use snugglr_db::models::UserRow;
use snugglr_types::models::Gender;

use crate::convert::parse_gender;
use crate::error::{EngineError, EngineResult};

/// Opposite genders match; `Other` matches everyone in both directions.
/// An unset gender matches nobody.
pub fn genders_compatible(a: Option<Gender>, b: Option<Gender>) -> bool {
    match (a, b) {
        (Some(Gender::Other), Some(_)) | (Some(_), Some(Gender::Other)) => true,
        (Some(a), Some(b)) => a != b,
        _ => false,
    }
}

pub fn same_community(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Whether `user` may see and like `other` at all.
pub fn eligible(user: &UserRow, other: &UserRow) -> bool {
    check(user, other).is_ok()
}

/// Gate for recording a like: same community, compatible genders.
pub fn check(actor: &UserRow, target: &UserRow) -> EngineResult<()> {
    if !same_community(&actor.community, &target.community) {
        return Err(EngineError::IneligibleTarget(
            "You can only like people from your own community".into(),
        ));
    }

    let actor_gender = parse_gender(actor.gender.as_deref());
    let target_gender = parse_gender(target.gender.as_deref());
    if !genders_compatible(actor_gender, target_gender) {
        return Err(EngineError::IneligibleTarget(
            "This user is not available to you".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use Gender::*;

    #[test]
    fn test_gender_matrix() {
        assert!(genders_compatible(Some(Male), Some(Female)));
        assert!(genders_compatible(Some(Female), Some(Male)));
        assert!(!genders_compatible(Some(Male), Some(Male)));
        assert!(!genders_compatible(Some(Female), Some(Female)));

        for g in [Male, Female, Other] {
            assert!(genders_compatible(Some(Other), Some(g)));
            assert!(genders_compatible(Some(g), Some(Other)));
            assert!(!genders_compatible(None, Some(g)));
            assert!(!genders_compatible(Some(g), None));
        }
        assert!(!genders_compatible(None, None));
    }

    #[test]
    fn test_community_compare() {
        assert!(same_community("State U", " state u "));
        assert!(!same_community("State U", "Tech"));
    }
}
