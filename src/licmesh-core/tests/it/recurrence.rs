//! Property-based tests for the recurrence arithmetic.
//!
//! Fixed-length cadences must ignore the calendar entirely; monthly and
//! yearly cadences must honor it, clamping the day-of-month and carrying
//! leap days correctly.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use proptest::prelude::*;

use licmesh_core::{Checksum, RepeatUnit, TimePeriod, ValidationSequence};

// =============================================================================
// Strategies
// =============================================================================

/// Strategy for instants between 1970 and roughly 2150, at second precision.
fn instant_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..5_680_000_000).prop_map(|secs| Utc.timestamp_opt(secs, 0).single().unwrap())
}

/// Strategy for period modifiers in a practical range.
fn modifier_strategy() -> impl Strategy<Value = u8> {
    1u8..=24
}

/// Strategy over the cadences with calendar-independent lengths.
fn fixed_unit_strategy() -> impl Strategy<Value = RepeatUnit> {
    prop_oneof![
        Just(RepeatUnit::Hourly),
        Just(RepeatUnit::Daily),
        Just(RepeatUnit::Weekly),
        Just(RepeatUnit::Fortnightly),
    ]
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 {
                29
            } else {
                28
            }
        }
        _ => unreachable!("month out of range"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    // ========================================================================
    // Fixed-length cadences
    // ========================================================================

    /// Hour, day and week based cadences are fixed multiples, independent
    /// of where in the calendar they start.
    #[test]
    fn fixed_units_ignore_the_calendar(
        start in instant_strategy(),
        unit in fixed_unit_strategy(),
        modifier in modifier_strategy()
    ) {
        let period = TimePeriod::with_modifier(unit, modifier).unwrap();
        let expected = match unit {
            RepeatUnit::Hourly => Duration::hours(i64::from(modifier)),
            RepeatUnit::Daily => Duration::days(i64::from(modifier)),
            RepeatUnit::Weekly => Duration::weeks(i64::from(modifier)),
            RepeatUnit::Fortnightly => Duration::weeks(2 * i64::from(modifier)),
            RepeatUnit::Monthly | RepeatUnit::Yearly => unreachable!(),
        };
        prop_assert_eq!(period.repeat_after(start), expected);
    }

    /// Every cadence moves strictly forward.
    #[test]
    fn repeats_are_strictly_positive(
        start in instant_strategy(),
        modifier in modifier_strategy()
    ) {
        for unit in [
            RepeatUnit::Hourly,
            RepeatUnit::Daily,
            RepeatUnit::Weekly,
            RepeatUnit::Fortnightly,
            RepeatUnit::Monthly,
            RepeatUnit::Yearly,
        ] {
            let period = TimePeriod::with_modifier(unit, modifier).unwrap();
            prop_assert!(period.repeat_after(start) > Duration::zero());
        }
    }

    // ========================================================================
    // Calendar cadences
    // ========================================================================

    /// A monthly repeat lands in the right month, clamping the day to the
    /// target month's length and keeping the time of day.
    #[test]
    fn monthly_repeat_is_calendar_correct(
        start in instant_strategy(),
        modifier in modifier_strategy()
    ) {
        let period = TimePeriod::with_modifier(RepeatUnit::Monthly, modifier).unwrap();
        let landed = start + period.repeat_after(start);

        let total = start.month0() + u32::from(modifier);
        let expected_year = start.year() + (total / 12) as i32;
        let expected_month = total % 12 + 1;

        prop_assert_eq!(landed.year(), expected_year);
        prop_assert_eq!(landed.month(), expected_month);
        prop_assert_eq!(
            landed.day(),
            start.day().min(days_in_month(expected_year, expected_month))
        );
        prop_assert_eq!(landed.time(), start.time());
    }

    /// A monthly repeat spans between 28 and 31 days per month crossed.
    #[test]
    fn monthly_span_is_bounded(
        start in instant_strategy(),
        modifier in modifier_strategy()
    ) {
        let period = TimePeriod::with_modifier(RepeatUnit::Monthly, modifier).unwrap();
        let span = period.repeat_after(start);
        prop_assert!(span >= Duration::days(28 * i64::from(modifier)));
        prop_assert!(span <= Duration::days(31 * i64::from(modifier)));
    }

    /// A yearly repeat advances the year, keeping the month and clamping
    /// a leap day to the 28th in non-leap target years.
    #[test]
    fn yearly_repeat_is_calendar_correct(
        start in instant_strategy(),
        modifier in modifier_strategy()
    ) {
        let period = TimePeriod::with_modifier(RepeatUnit::Yearly, modifier).unwrap();
        let landed = start + period.repeat_after(start);

        let expected_year = start.year() + i32::from(modifier);
        prop_assert_eq!(landed.year(), expected_year);
        prop_assert_eq!(landed.month(), start.month());
        prop_assert_eq!(
            landed.day(),
            start.day().min(days_in_month(expected_year, start.month()))
        );
        prop_assert_eq!(landed.time(), start.time());
    }

    // ========================================================================
    // Sequence due-ness
    // ========================================================================

    /// Due-ness is monotone: never due before the due time, always due
    /// from the due time onward.
    #[test]
    fn dueness_is_monotone(
        next_due in instant_strategy(),
        early in 1i64..1_000_000,
        late in 0i64..1_000_000
    ) {
        let sequence = ValidationSequence::new(TimePeriod::hourly(), next_due).unwrap();
        prop_assert!(!sequence.is_due_at(next_due - Duration::seconds(early)));
        prop_assert!(sequence.is_due_at(next_due + Duration::seconds(late)));
    }

    // ========================================================================
    // Checksum construction
    // ========================================================================

    /// Any properly ordered window yields a checksum that keeps its fields.
    #[test]
    fn checksum_roundtrips_valid_windows(
        text in "[A-Za-z0-9]{1,64}",
        start in instant_strategy(),
        span_secs in 1i64..100_000_000
    ) {
        let expires = start + Duration::seconds(span_secs);
        let checksum = Checksum::new(text.clone(), start, expires).unwrap();
        prop_assert_eq!(checksum.text(), text.as_str());
        prop_assert_eq!(checksum.generated(), start);
        prop_assert_eq!(checksum.expires(), expires);
    }

    /// An inverted or empty window never constructs.
    #[test]
    fn checksum_rejects_invalid_windows(
        text in "[A-Za-z0-9]{1,64}",
        start in instant_strategy(),
        span_secs in 0i64..100_000_000
    ) {
        let earlier = start - Duration::seconds(span_secs);
        prop_assert!(Checksum::new(text, start, earlier).is_err());
    }

    /// Equal inputs agree on the hash; a different label never does.
    #[test]
    fn checksum_equality_follows_inputs(
        text in "[A-Za-z0-9]{1,64}",
        start in instant_strategy(),
        span_secs in 1i64..100_000_000
    ) {
        let expires = start + Duration::seconds(span_secs);
        let first = Checksum::new(text.clone(), start, expires).unwrap();
        let second = Checksum::new(text.clone(), start, expires).unwrap();
        prop_assert_eq!(&first, &second);

        let relabeled = Checksum::new(format!("{text}-x"), start, expires).unwrap();
        prop_assert_ne!(&first, &relabeled);
    }
}
