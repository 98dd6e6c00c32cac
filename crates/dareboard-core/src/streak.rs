use dareboard_types::models::millis_to_utc;

/// Daily streak after a completion at `now_ms`, counted on UTC calendar days.
///
/// Same day as the last completion keeps the streak, the following day extends
/// it, anything else (including a first completion) starts over at 1.
pub fn next_streak(current: u32, last_completion_ms: Option<i64>, now_ms: i64) -> u32 {
    let Some(last_ms) = last_completion_ms else {
        return 1;
    };

    let last_day = millis_to_utc(last_ms).date_naive();
    let today = millis_to_utc(now_ms).date_naive();

    match (today - last_day).num_days() {
        // Clock went backwards; don't punish the user for it.
        d if d <= 0 => current.max(1),
        1 => current.saturating_add(1),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 24 * 60 * 60 * 1000;
    // 2024-03-10T08:00:00Z
    const MORNING: i64 = 1_710_057_600_000;

    #[test]
    fn first_completion_starts_at_one() {
        assert_eq!(next_streak(0, None, MORNING), 1);
    }

    #[test]
    fn same_day_keeps_streak() {
        assert_eq!(next_streak(4, Some(MORNING), MORNING + 10 * 60 * 60 * 1000), 4);
    }

    #[test]
    fn next_day_extends_even_across_short_gaps() {
        // 23:30 one day, 00:10 the next: different calendar days.
        let late = MORNING + 15 * 60 * 60 * 1000 + 30 * 60 * 1000;
        let early_next = MORNING + 16 * 60 * 60 * 1000 + 10 * 60 * 1000;
        assert_eq!(next_streak(2, Some(late), early_next), 3);
        assert_eq!(next_streak(2, Some(MORNING), MORNING + DAY), 3);
    }

    #[test]
    fn missed_day_resets() {
        assert_eq!(next_streak(9, Some(MORNING), MORNING + 2 * DAY), 1);
    }
}
