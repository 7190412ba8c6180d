//! xs:dateTime, xs:date and xs:time lexical codecs
//!
//! Timezones are optional in XSD, so each value keeps the naive chrono
//! value plus an optional fixed offset.

use std::fmt;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Error, Result};

/// Split a trailing `Z` or `+hh:mm`/`-hh:mm` timezone from `text`
fn split_timezone(text: &str) -> Result<(&str, Option<FixedOffset>)> {
    if let Some(body) = text.strip_suffix('Z') {
        return Ok((body, FixedOffset::east_opt(0)));
    }
    let bytes = text.as_bytes();
    if bytes.len() > 6 {
        let sign_at = bytes.len() - 6;
        let sign = bytes[sign_at];
        if (sign == b'+' || sign == b'-') && bytes[bytes.len() - 3] == b':' {
            let tz = &text[sign_at + 1..];
            let hours: i32 = tz[..2]
                .parse()
                .map_err(|_| Error::Lexical(format!("Invalid timezone in '{}'", text)))?;
            let minutes: i32 = tz[3..]
                .parse()
                .map_err(|_| Error::Lexical(format!("Invalid timezone in '{}'", text)))?;
            if hours > 14 || minutes > 59 || (hours == 14 && minutes != 0) {
                return Err(Error::Lexical(format!("Timezone out of range in '{}'", text)));
            }
            let mut seconds = hours * 3600 + minutes * 60;
            if sign == b'-' {
                seconds = -seconds;
            }
            let offset = FixedOffset::east_opt(seconds)
                .ok_or_else(|| Error::Lexical(format!("Invalid timezone in '{}'", text)))?;
            return Ok((&text[..sign_at], Some(offset)));
        }
    }
    Ok((text, None))
}

fn write_timezone(f: &mut fmt::Formatter<'_>, offset: &Option<FixedOffset>) -> fmt::Result {
    match offset {
        None => Ok(()),
        Some(offset) => {
            let secs = offset.local_minus_utc();
            if secs == 0 {
                return write!(f, "Z");
            }
            let sign = if secs < 0 { '-' } else { '+' };
            let secs = secs.abs();
            write!(f, "{}{:02}:{:02}", sign, secs / 3600, (secs % 3600) / 60)
        }
    }
}

/// Parsed xs:dateTime value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XsDateTime {
    /// Local date and time
    pub value: NaiveDateTime,
    /// Timezone, if the literal carried one
    pub offset: Option<FixedOffset>,
}

impl XsDateTime {
    /// Parse the lexical form
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (body, offset) = split_timezone(text)?;
        let value = NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|e| Error::Lexical(format!("Invalid dateTime '{}': {}", text, e)))?;
        Ok(Self { value, offset })
    }
}

impl fmt::Display for XsDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value.format("%Y-%m-%dT%H:%M:%S%.f"))?;
        write_timezone(f, &self.offset)
    }
}

/// Parsed xs:date value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XsDate {
    /// Calendar date
    pub value: NaiveDate,
    /// Timezone, if the literal carried one
    pub offset: Option<FixedOffset>,
}

impl XsDate {
    /// Parse the lexical form
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (body, offset) = split_timezone(text)?;
        let value = NaiveDate::parse_from_str(body, "%Y-%m-%d")
            .map_err(|e| Error::Lexical(format!("Invalid date '{}': {}", text, e)))?;
        Ok(Self { value, offset })
    }
}

impl fmt::Display for XsDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value.format("%Y-%m-%d"))?;
        write_timezone(f, &self.offset)
    }
}

/// Parsed xs:time value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XsTime {
    /// Local time
    pub value: NaiveTime,
    /// Timezone, if the literal carried one
    pub offset: Option<FixedOffset>,
}

impl XsTime {
    /// Parse the lexical form
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (body, offset) = split_timezone(text)?;
        let value = NaiveTime::parse_from_str(body, "%H:%M:%S%.f")
            .map_err(|e| Error::Lexical(format!("Invalid time '{}': {}", text, e)))?;
        Ok(Self { value, offset })
    }
}

impl fmt::Display for XsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value.format("%H:%M:%S%.f"))?;
        write_timezone(f, &self.offset)
    }
}
