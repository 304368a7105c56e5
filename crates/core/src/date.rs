// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Date-period helper used by the repository `find` filters.

use chrono::NaiveDate;

/// Returns the inclusive `(central - offset days, central + offset days)` pair.
///
/// Ported from the original `range_date(central_day, offset)`: a central day
/// plus a symmetric offset in days, used for the `period`/`periodOffset`
/// query filters.
pub fn range_date(central: NaiveDate, offset: i64) -> (NaiveDate, NaiveDate) {
    let delta = chrono::Duration::days(offset);
    (central - delta, central + delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_offset_returns_the_same_day_twice() {
        let d = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        assert_eq!(range_date(d, 0), (d, d));
    }

    #[test]
    fn symmetric_offset_brackets_the_central_day() {
        let d = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let (start, stop) = range_date(d, 15);
        assert_eq!(start, d - chrono::Duration::days(15));
        assert_eq!(stop, d + chrono::Duration::days(15));
    }

    #[test]
    fn crosses_month_boundaries() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let (start, _stop) = range_date(d, 5);
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 2, 24).unwrap());
    }

    proptest::proptest! {
        #[test]
        fn offset_is_always_symmetric(days in 0i64..3650, offset in 0i64..3650) {
            let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(days);
            let (start, stop) = range_date(d, offset);
            proptest::prop_assert_eq!(d - start, chrono::Duration::days(offset));
            proptest::prop_assert_eq!(stop - d, chrono::Duration::days(offset));
        }
    }
}
