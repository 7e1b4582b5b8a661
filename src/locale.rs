// src/locale.rs
//! Norwegian display formatting: month names, "updated" stamp, digit grouping.

use chrono::{Datelike, Days, Local, NaiveDate};

const MONTHS_NB: [&str; 12] = [
    "januar",
    "februar",
    "mars",
    "april",
    "mai",
    "juni",
    "juli",
    "august",
    "september",
    "oktober",
    "november",
    "desember",
];

/// Norwegian month name for a 1-based month number.
pub fn month_name(month: u32) -> &'static str {
    let idx = month.clamp(1, 12) as usize - 1;
    MONTHS_NB[idx]
}

/// "Oppdatert <day>. <month> <year> - 23:59", stamped as the day before `today`.
pub fn updated_stamp(today: NaiveDate) -> String {
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
    format!(
        "Oppdatert {}. {} {} - 23:59",
        yesterday.day(),
        month_name(yesterday.month()),
        yesterday.year()
    )
}

pub fn updated_stamp_now() -> String {
    updated_stamp(Local::now().date_naive())
}

/// Whole number with thousands separated by single spaces: 1234567 -> "1 234 567".
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    let lead = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - lead) % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_is_yesterday() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 10).unwrap();
        assert_eq!(updated_stamp(today), "Oppdatert 9. juli 2024 - 23:59");
    }

    #[test]
    fn stamp_crosses_year_boundary() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(updated_stamp(today), "Oppdatert 31. desember 2024 - 23:59");
    }

    #[test]
    fn grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1 000");
        assert_eq!(group_thousands(3_000_000), "3 000 000");
        assert_eq!(group_thousands(12_345_678), "12 345 678");
        assert_eq!(group_thousands(-45_000), "-45 000");
    }
}
