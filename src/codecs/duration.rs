//! xs:duration lexical codec
//!
//! `PnYnMnDTnHnMnS` with an optional leading minus sign. Only the seconds
//! component may carry a fraction.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// Parsed xs:duration value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Duration {
    /// Negative duration
    pub negative: bool,
    /// Years
    pub years: u64,
    /// Months
    pub months: u64,
    /// Days
    pub days: u64,
    /// Hours
    pub hours: u64,
    /// Minutes
    pub minutes: u64,
    /// Seconds, possibly fractional
    pub seconds: Decimal,
}

impl Duration {
    /// Parse the lexical form
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let bad = || Error::Lexical(format!("Invalid duration '{}'", text));

        let (negative, rest) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let rest = rest.strip_prefix('P').ok_or_else(bad)?;
        let (date_part, time_part) = match rest.split_once('T') {
            Some((date, time)) => {
                if time.is_empty() {
                    return Err(bad());
                }
                (date, Some(time))
            }
            None => (rest, None),
        };
        if date_part.is_empty() && time_part.is_none() {
            return Err(bad());
        }

        let mut duration = Duration {
            negative,
            ..Default::default()
        };

        for (value, designator) in components(date_part, &['Y', 'M', 'D']).ok_or_else(bad)? {
            let n = value.parse::<u64>().map_err(|_| bad())?;
            match designator {
                'Y' => duration.years = n,
                'M' => duration.months = n,
                _ => duration.days = n,
            }
        }

        if let Some(time_part) = time_part {
            for (value, designator) in components(time_part, &['H', 'M', 'S']).ok_or_else(bad)? {
                if designator == 'S' {
                    if value.starts_with('.') || value.ends_with('.') {
                        return Err(bad());
                    }
                    duration.seconds = Decimal::from_str(value).map_err(|_| bad())?;
                    continue;
                }
                let n = value.parse::<u64>().map_err(|_| bad())?;
                match designator {
                    'H' => duration.hours = n,
                    _ => duration.minutes = n,
                }
            }
        }

        Ok(duration)
    }

    /// Whether every component is zero
    pub fn is_zero(&self) -> bool {
        self.years == 0
            && self.months == 0
            && self.days == 0
            && self.hours == 0
            && self.minutes == 0
            && self.seconds.is_zero()
    }
}

/// Split `5Y3M` style text into (number, designator) pairs, enforcing the
/// designator order. Fractions are only accepted before `S`.
fn components<'a>(text: &'a str, order: &[char]) -> Option<Vec<(&'a str, char)>> {
    let mut out = Vec::new();
    let mut next_allowed = 0;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if c.is_ascii_digit() || (c == '.' && order.contains(&'S')) {
            continue;
        }
        let pos = order.iter().position(|d| *d == c)?;
        if pos < next_allowed || i == start {
            return None;
        }
        let value = &text[start..i];
        if value.contains('.') && c != 'S' {
            return None;
        }
        out.push((value, c));
        next_allowed = pos + 1;
        start = i + c.len_utf8();
    }

    if start != text.len() {
        return None;
    }
    Some(out)
}

impl FromStr for Duration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Duration::parse(s)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative && !self.is_zero() {
            write!(f, "-")?;
        }
        write!(f, "P")?;
        if self.years > 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months > 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days > 0 {
            write!(f, "{}D", self.days)?;
        }
        let has_time = self.hours > 0 || self.minutes > 0 || !self.seconds.is_zero();
        if has_time {
            write!(f, "T")?;
            if self.hours > 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes > 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if !self.seconds.is_zero() {
                write!(f, "{}S", self.seconds.normalize())?;
            }
        } else if self.years == 0 && self.months == 0 && self.days == 0 {
            write!(f, "T0S")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_duration() {
        let d = Duration::parse("P1Y2M3DT4H5M6.5S").unwrap();
        assert_eq!(d.years, 1);
        assert_eq!(d.months, 2);
        assert_eq!(d.days, 3);
        assert_eq!(d.hours, 4);
        assert_eq!(d.minutes, 5);
        assert_eq!(d.seconds, Decimal::from_str("6.5").unwrap());
        assert!(!d.negative);
    }

    #[test]
    fn test_parse_partial_durations() {
        assert_eq!(Duration::parse("PT30M").unwrap().minutes, 30);
        assert_eq!(Duration::parse("P10D").unwrap().days, 10);
        let neg = Duration::parse("-P1Y").unwrap();
        assert!(neg.negative);
        assert_eq!(neg.years, 1);
    }

    #[test]
    fn test_invalid_durations() {
        for bad in ["", "P", "PT", "1Y", "P1S", "PT1Y", "P1M1Y", "P1.5Y", "PT.5S", "P-1Y", "PxY"] {
            assert!(Duration::parse(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Duration::parse("P1Y2M3DT4H5M6.5S").unwrap().to_string(), "P1Y2M3DT4H5M6.5S");
        assert_eq!(Duration::parse("-PT1M").unwrap().to_string(), "-PT1M");
        assert_eq!(Duration::parse("PT0S").unwrap().to_string(), "PT0S");
    }
}
