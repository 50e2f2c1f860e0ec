//! AMQP topic pattern matching.
//!
//! Routing keys are dot-separated words. In a binding pattern `*`
//! stands for exactly one word and `#` for zero or more words.

/// Returns `true` if `routing_key` matches the binding `pattern`.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => {
            (0..=key.len()).any(|skip| match_words(rest, &key[skip..]))
        }
        Some((&"*", rest)) => !key.is_empty() && match_words(rest, &key[1..]),
        Some((word, rest)) => {
            key.first() == Some(word) && match_words(rest, &key[1..])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_key_matches() {
        assert!(topic_matches("pause", "pause"));
        assert!(!topic_matches("pause", "resume"));
    }

    #[test]
    fn test_star_matches_exactly_one_word() {
        assert!(topic_matches("army_moves.*", "army_moves.alice"));
        assert!(!topic_matches("army_moves.*", "army_moves"));
        assert!(!topic_matches("army_moves.*", "army_moves.alice.extra"));
        assert!(!topic_matches("army_moves.*", "war.alice"));
    }

    #[test]
    fn test_hash_matches_zero_or_more_words() {
        assert!(topic_matches("#", "anything.at.all"));
        assert!(topic_matches("game_logs.#", "game_logs"));
        assert!(topic_matches("game_logs.#", "game_logs.alice"));
        assert!(topic_matches("game_logs.#", "game_logs.alice.extra"));
        assert!(topic_matches("#.alice", "war.alice"));
        assert!(!topic_matches("#.alice", "war.bob"));
    }

    #[test]
    fn test_star_in_the_middle() {
        assert!(topic_matches("a.*.c", "a.b.c"));
        assert!(!topic_matches("a.*.c", "a.c"));
    }
}
