use defenserama_types::models::Character;

/// Characters ranked by karma, highest first. Ties keep insertion order.
pub fn top_defenders(mut characters: Vec<Character>, limit: usize) -> Vec<Character> {
    characters.sort_by(|a, b| b.karma.cmp(&a.karma).then(a.id.cmp(&b.id)));
    characters.truncate(limit);
    characters
}

/// Characters whose net karma is closest to zero. Ties keep insertion order.
pub fn hall_of_plain(mut characters: Vec<Character>, limit: usize) -> Vec<Character> {
    characters.sort_by(|a, b| {
        a.karma
            .unsigned_abs()
            .cmp(&b.karma.unsigned_abs())
            .then(a.id.cmp(&b.id))
    });
    characters.truncate(limit);
    characters
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn character(id: i64, karma: i64) -> Character {
        Character {
            id,
            name: format!("c{id}"),
            kind: "HERO".into(),
            description: String::new(),
            text_avatar: "(o_o)".into(),
            user_id: None,
            karma,
            created_at: Utc::now(),
        }
    }

    fn ids(chars: &[Character]) -> Vec<i64> {
        chars.iter().map(|c| c.id).collect()
    }

    #[test]
    fn top_defenders_sorts_descending_with_stable_ties() {
        let chars = vec![
            character(1, 3),
            character(2, 10),
            character(3, -4),
            character(4, 10),
            character(5, 0),
        ];
        assert_eq!(ids(&top_defenders(chars, 10)), [2, 4, 1, 5, 3]);
    }

    #[test]
    fn hall_of_plain_sorts_by_distance_from_zero() {
        let chars = vec![
            character(1, -2),
            character(2, 7),
            character(3, 1),
            character(4, 2),
            character(5, -1),
            character(6, 0),
        ];
        assert_eq!(ids(&hall_of_plain(chars, 4)), [6, 3, 5, 1]);
    }

    #[test]
    fn limits_never_exceed_collection() {
        let chars = vec![character(1, 1), character(2, 2)];
        assert_eq!(top_defenders(chars.clone(), 50).len(), 2);
        assert!(hall_of_plain(chars, 0).is_empty());
    }

    #[test]
    fn extreme_karma_does_not_overflow() {
        let chars = vec![character(1, i64::MIN), character(2, i64::MAX)];
        assert_eq!(ids(&hall_of_plain(chars, 2)), [2, 1]);
    }
}
