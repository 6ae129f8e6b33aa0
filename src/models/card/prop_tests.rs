use super::*;
use proptest::prelude::*;

proptest! {
    /// Any code either decodes to a queue that encodes back to it, or is rejected
    #[test]
    fn prop_queue_code_round_trip(code in -10i32..10) {
        match Queue::try_from(code) {
            Ok(queue) => prop_assert_eq!(queue.code(), code),
            Err(err) => prop_assert_eq!(err.code, code),
        }
    }

    #[test]
    fn prop_card_type_code_round_trip(code in -5i32..5) {
        match CardType::try_from(code) {
            Ok(card_type) => {
                prop_assert_eq!(card_type.code(), code);
                prop_assert_eq!(card_type.home_queue().code(), code);
            }
            Err(_) => prop_assert!(!(0..=2).contains(&code)),
        }
    }

    /// Recorded answer time stays within [0, cap]
    #[test]
    fn prop_time_taken_bounded(
        started in 0i64..1_000_000_000,
        elapsed in -10_000i64..10_000_000,
        cap in 1u32..600,
    ) {
        let mut card = Card::new(1, 1, 1, 0, 0);
        card.start_timer(started);
        let taken = card.time_taken(started + elapsed, cap);
        prop_assert!(taken >= 0);
        prop_assert!(taken <= cap as i64 * 1000);
    }

    #[test]
    fn prop_left_unpacks(today in 0u32..100, total in 0u32..1000) {
        let mut card = Card::new(1, 1, 1, 0, 0);
        card.left = today * 1000 + total;
        prop_assert_eq!(card.steps_remaining(), total);
        prop_assert_eq!(card.steps_remaining_today(), today);
    }
}
