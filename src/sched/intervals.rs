//! Interval arithmetic
//!
//! Pure functions with no access to the collection, so they can be tested
//! and property-checked in isolation. Intervals are in days, delays in
//! seconds.

use crate::clock::SECONDS_PER_DAY;
use crate::models::{LapseConfig, MINIMUM_FACTOR, RevConfig};

/// Delay of the learning step that `left` points at, in seconds
///
/// `left` counts the steps still to go, so the step is
/// `delays[len - left]`. Out-of-range values fall back to the first step,
/// and an empty step list to one minute.
pub fn delay_for_step(delays: &[f32], left: u32) -> i64 {
    let left = (left % 1000) as usize;
    let minutes = if left >= 1 && left <= delays.len() {
        delays[delays.len() - left]
    } else {
        delays.first().copied().unwrap_or(1.0)
    };
    (f64::from(minutes) * 60.0) as i64
}

/// How many of the last `left` steps can be completed before the day ends
///
/// Always at least 1.
pub fn left_today(delays: &[f32], left: u32, now: i64, day_cutoff: i64) -> u32 {
    let left = left as usize;
    let tail = if left == 0 || left >= delays.len() { delays } else { &delays[delays.len() - left..] };
    let mut at = now;
    let mut ok = 0;
    for (i, minutes) in tail.iter().enumerate() {
        at += (f64::from(*minutes) * 60.0) as i64;
        if at > day_cutoff {
            break;
        }
        ok = i;
    }
    ok as u32 + 1
}

/// Packed `left` value for a card starting the given steps
pub fn starting_left(delays: &[f32], now: i64, day_cutoff: i64) -> u32 {
    let total = delays.len() as u32;
    total + left_today(delays, total, now, day_cutoff) * 1000
}

/// Inclusive range a review interval may be fuzzed to
pub fn fuzz_ivl_range(ivl: u32) -> (u32, u32) {
    if ivl < 2 {
        return (1, 1);
    }
    if ivl == 2 {
        return (2, 3);
    }
    let fuzz = if ivl < 7 {
        (f64::from(ivl) * 0.25) as u32
    } else if ivl < 30 {
        ((f64::from(ivl) * 0.15) as u32).max(2)
    } else {
        ((f64::from(ivl) * 0.05) as u32).max(4)
    };
    let fuzz = fuzz.max(1);
    (ivl - fuzz, ivl + fuzz)
}

/// Applies the interval modifier and keeps the result above `prev`
pub fn constrained_ivl(ivl: f64, ivl_fct: f64, prev: u32) -> u32 {
    let scaled = ivl * ivl_fct;
    let floor = f64::from(prev) + 1.0;
    scaled.max(floor) as u32
}

/// Unfuzzed intervals for Hard, Good and Easy on a review card
///
/// Each tier is strictly longer than the one before it, and Hard is strictly
/// longer than the current interval. The maximum interval is not applied.
pub fn review_intervals(ivl: u32, factor: i32, days_late: i64, conf: &RevConfig) -> (u32, u32, u32) {
    let ivl_f = f64::from(ivl);
    let late = days_late.max(0);
    let fct = f64::from(factor) / 1000.0;
    let hard = constrained_ivl((ivl_f + (late / 4) as f64) * 1.2, conf.ivl_fct, ivl);
    let good = constrained_ivl((ivl_f + (late / 2) as f64) * fct, conf.ivl_fct, hard);
    let easy = constrained_ivl((ivl_f + late as f64) * fct * conf.ease4, conf.ivl_fct, good);
    (hard, good, easy)
}

/// Interval after a lapse
pub fn next_lapse_ivl(ivl: u32, conf: &LapseConfig) -> u32 {
    conf.min_int.max((f64::from(ivl) * conf.mult) as u32)
}

/// Ease after an answer on a review card, never below the minimum
pub fn adjusted_factor(factor: i32, delta: i32) -> i32 {
    (factor + delta).max(MINIMUM_FACTOR)
}

/// Interval for a review card seen early in a filtered deck
///
/// Credits the time that has already passed since the last review.
pub fn dyn_ivl_boost(ivl: u32, factor: i32, odue: i64, today: i64, max_ivl: u32) -> u32 {
    let elapsed = i64::from(ivl) - (odue - today);
    let fct = (f64::from(factor) / 1000.0 + 1.2) / 2.0;
    let boosted = f64::from(ivl).max(elapsed as f64 * fct).max(1.0) as u32;
    boosted.min(max_ivl)
}

/// True when a lapse count marks a card as a leech
///
/// The first trigger is at `leech_fails` lapses, then every half of that.
pub fn is_leech(lapses: u32, leech_fails: u32) -> bool {
    if leech_fails == 0 || lapses < leech_fails {
        return false;
    }
    (lapses - leech_fails) % (leech_fails / 2).max(1) == 0
}

/// Day number for a learning due time that falls after the cutoff
pub fn day_learn_due(due_secs: i64, day_cutoff: i64, today: i64) -> i64 {
    today + (due_secs - day_cutoff).div_euclid(SECONDS_PER_DAY) + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LeechAction;

    fn rev_conf() -> RevConfig {
        RevConfig { ivl_fct: 1.0, ease4: 1.3, max_ivl: 36_500, ..RevConfig::default() }
    }

    #[test]
    fn test_delay_for_step() {
        let delays = [1.0, 10.0];
        assert_eq!(delay_for_step(&delays, 2), 60);
        assert_eq!(delay_for_step(&delays, 1), 600);
        assert_eq!(delay_for_step(&delays, 1001), 600);
        assert_eq!(delay_for_step(&delays, 0), 60);
        assert_eq!(delay_for_step(&delays, 7), 60);
        assert_eq!(delay_for_step(&[], 1), 60);
        assert_eq!(delay_for_step(&[0.5], 1), 30);
    }

    #[test]
    fn test_left_today() {
        let delays = [1.0, 10.0];
        // plenty of time
        assert_eq!(left_today(&delays, 2, 0, 10_000), 2);
        // only the first step fits
        assert_eq!(left_today(&delays, 2, 0, 300), 1);
        // nothing fits, still reports one
        assert_eq!(left_today(&delays, 2, 0, 10), 1);
        assert_eq!(left_today(&[], 0, 0, 10), 1);
    }

    #[test]
    fn test_starting_left() {
        assert_eq!(starting_left(&[1.0, 10.0], 0, 100_000), 2002);
        assert_eq!(starting_left(&[1.0, 10.0], 0, 100), 1002);
    }

    #[test]
    fn test_fuzz_ranges() {
        assert_eq!(fuzz_ivl_range(0), (1, 1));
        assert_eq!(fuzz_ivl_range(1), (1, 1));
        assert_eq!(fuzz_ivl_range(2), (2, 3));
        assert_eq!(fuzz_ivl_range(4), (3, 5));
        assert_eq!(fuzz_ivl_range(10), (8, 12));
        assert_eq!(fuzz_ivl_range(100), (95, 105));
        assert_eq!(fuzz_ivl_range(40), (36, 44));
    }

    #[test]
    fn test_review_intervals_on_time() {
        let (hard, good, easy) = review_intervals(10, 2500, 0, &rev_conf());
        assert_eq!(hard, 12);
        assert_eq!(good, 25);
        assert_eq!(easy, 32);
    }

    #[test]
    fn test_review_intervals_respect_floor() {
        // a very low ease would otherwise shrink the interval
        let (hard, good, easy) = review_intervals(1, 1300, 0, &rev_conf());
        assert_eq!(hard, 2);
        assert_eq!(good, 3);
        assert_eq!(easy, 4);
    }

    #[test]
    fn test_review_intervals_credit_lateness() {
        let (_, good_on_time, _) = review_intervals(10, 2500, 0, &rev_conf());
        let (_, good_late, _) = review_intervals(10, 2500, 10, &rev_conf());
        assert!(good_late > good_on_time);
    }

    #[test]
    fn test_next_lapse_ivl() {
        let conf = LapseConfig {
            delays: vec![10.0],
            mult: 0.5,
            min_int: 1,
            leech_fails: 8,
            leech_action: LeechAction::Suspend,
        };
        assert_eq!(next_lapse_ivl(10, &conf), 5);
        assert_eq!(next_lapse_ivl(1, &conf), 1);
        assert_eq!(next_lapse_ivl(10, &LapseConfig { mult: 0.0, ..conf }), 1);
    }

    #[test]
    fn test_factor_floor() {
        assert_eq!(adjusted_factor(1400, -200), MINIMUM_FACTOR);
        assert_eq!(adjusted_factor(2500, 150), 2650);
    }

    #[test]
    fn test_dyn_ivl_boost() {
        // reviewed 10 days ago with a 20 day interval
        assert_eq!(dyn_ivl_boost(20, 2500, 110, 100, 36_500), 20);
        // overdue card gets credit for the extra time
        assert_eq!(dyn_ivl_boost(10, 2500, 90, 100, 36_500), 37);
        assert_eq!(dyn_ivl_boost(10, 2500, 90, 100, 15), 15);
    }

    #[test]
    fn test_is_leech() {
        assert!(!is_leech(7, 8));
        assert!(is_leech(8, 8));
        assert!(!is_leech(9, 8));
        assert!(is_leech(12, 8));
        assert!(is_leech(16, 8));
        assert!(!is_leech(100, 0));
        assert!(is_leech(1, 1));
        assert!(is_leech(2, 1));
    }

    #[test]
    fn test_day_learn_due() {
        assert_eq!(day_learn_due(1_000, 1_000 - 1, 5), 6);
        assert_eq!(day_learn_due(1_000 + SECONDS_PER_DAY, 1_000, 5), 7);
    }
}
