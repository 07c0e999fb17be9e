//! Lenient parsing of the backend's `publication_date` strings.
//!
//! Semantic Scholar hands out `YYYY-MM-DD`, but older records can carry only a
//! year or a year and month. Anything that does not start with a four-digit
//! year is treated as unknown.

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A calendar date with optional month/day precision. Ordering is
/// chronological; a less precise date sorts before a more precise one in the
/// same year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PartialDate {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl PartialDate {
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        let s = s.split(|c: char| c == 'T' || c == ' ').next().unwrap_or("");
        let mut parts = s.split('-');

        let y = parts.next()?;
        if y.len() != 4 || !y.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let year: i32 = y.parse().ok()?;

        let month = match parts.next() {
            None => None,
            Some(m) => Some(m.parse::<u32>().ok().filter(|m| (1..=12).contains(m))?),
        };
        let day = match (month, parts.next()) {
            (_, None) => None,
            (None, Some(_)) => return None,
            (Some(_), Some(d)) => Some(d.parse::<u32>().ok().filter(|d| (1..=31).contains(d))?),
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { year, month, day })
    }

    /// `Mar 2023`, or just `2023` when the month is unknown.
    pub fn short_label(&self) -> String {
        match self.month {
            Some(m) => format!("{} {}", MONTHS[(m - 1) as usize], self.year),
            None => self.year.to_string(),
        }
    }
}

/// Display form used on paper cards.
pub fn format_date(raw: Option<&str>) -> String {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => "Date unknown".to_string(),
        Some(s) => PartialDate::parse(s)
            .map(|d| d.short_label())
            .unwrap_or_else(|| s.to_string()),
    }
}
