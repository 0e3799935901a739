use super::types::Turn;

/// Default number of turns surfaced to callers (5 user/assistant exchanges).
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Most recent `limit_turns` entries of `history`, oldest first.
pub fn windowed(history: &[Turn], limit_turns: usize) -> &[Turn] {
    &history[history.len().saturating_sub(limit_turns)..]
}

/// Bounds the history returned after a turn. Stored history and the
/// generation context are never affected.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    limit_turns: usize,
}

impl RetentionPolicy {
    pub fn new(limit_turns: usize) -> Self {
        Self { limit_turns }
    }

    pub fn limit_turns(&self) -> usize {
        self.limit_turns
    }

    pub fn window<'a>(&self, history: &'a [Turn]) -> &'a [Turn] {
        windowed(history, self.limit_turns)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(len: usize) -> Vec<Turn> {
        (0..len).map(|i| Turn::user(i.to_string())).collect()
    }

    #[test]
    fn test_long_history_keeps_last_entries() {
        let turns = history(14);
        let window = windowed(&turns, 10);

        assert_eq!(window.len(), 10);
        assert_eq!(window.first().unwrap().text, "4");
        assert_eq!(window.last().unwrap().text, "13");
    }

    #[test]
    fn test_short_history_is_returned_whole() {
        let turns = history(6);
        assert_eq!(windowed(&turns, 10), turns.as_slice());
        assert_eq!(windowed(&turns, 6), turns.as_slice());
        assert!(windowed(&[], 10).is_empty());
    }

    #[test]
    fn test_window_is_idempotent() {
        let turns = history(25);
        let once = windowed(&turns, 10).to_vec();
        let twice = windowed(&once, 10);

        assert_eq!(once.as_slice(), twice);
    }

    #[test]
    fn test_policy_default_and_zero_limit() {
        let turns = history(12);
        assert_eq!(RetentionPolicy::default().window(&turns).len(), DEFAULT_HISTORY_WINDOW);
        assert!(RetentionPolicy::new(0).window(&turns).is_empty());
    }
}
