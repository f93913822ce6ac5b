use serde::{Deserialize, Serialize};

/// Calendar year on the timeline. Negative values are BCE.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Year(pub i32);

impl Year {
    pub fn distance(self, other: Year) -> u32 {
        self.0.abs_diff(other.0)
    }

    /// Parses the leading year of a provider date string (`"2019"`, `"2019-06"`,
    /// `"2019-06-30"`). A leading `-` is accepted for BCE years.
    pub fn parse_date_prefix(date: &str) -> Option<Year> {
        let date = date.trim();
        let (sign, digits) = match date.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, date),
        };
        let end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        if end == 0 {
            return None;
        }
        digits[..end].parse::<i32>().ok().map(|y| Year(sign * y))
    }

    pub fn offset(self, years: i32) -> Year {
        Year(self.0.saturating_add(years))
    }
}

impl std::fmt::Display for Year {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive year range.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct YearSpan {
    pub start: Year,
    pub end: Year,
}

impl YearSpan {
    pub fn around(center: Year, radius: u32) -> Self {
        let r = radius.min(i32::MAX as u32) as i32;
        Self {
            start: center.offset(-r),
            end: center.offset(r),
        }
    }

    pub fn contains(&self, y: Year) -> bool {
        y >= self.start && y <= self.end
    }
}
