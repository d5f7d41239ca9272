//! Date strings (`D:YYYYMMDDHHmmSS+HH'mm'`).
//!
//! ```rust
//! use chrono::{FixedOffset, TimeZone};
//! use pdf_cos::PdfString;
//!
//! let offset = FixedOffset::east_opt(2 * 3600).unwrap();
//! let date = offset.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
//! let string = PdfString::from_date(&date);
//! assert_eq!(string.as_bytes(), b"D:20240309140500+02'00'");
//! assert_eq!(string.as_date(), Some(date));
//! ```

use crate::value::PdfString;
use chrono::{DateTime, FixedOffset, TimeZone};

impl PdfString {
    /// Formats a date with its UTC offset.
    #[must_use]
    pub fn from_date(date: &DateTime<FixedOffset>) -> Self {
        let offset = date.offset().local_minus_utc();
        let sign = if offset < 0 { '-' } else { '+' };
        let minutes = offset.abs() / 60;
        let text = format!(
            "D:{}{}{:02}'{:02}'",
            date.format("%Y%m%d%H%M%S"),
            sign,
            minutes / 60,
            minutes % 60
        );
        PdfString::from(text)
    }

    /// Parses a date string. Everything after the year is optional; missing fields take
    /// their earliest value and a missing offset means UTC.
    #[must_use]
    pub fn as_date(&self) -> Option<DateTime<FixedOffset>> {
        let bytes = self.as_bytes();
        let mut cursor = DateCursor {
            bytes: bytes.strip_prefix(b"D:").unwrap_or(bytes),
            position: 0,
        };

        let year = cursor.number(4)? as i32;
        let month = cursor.number(2).unwrap_or(1);
        let day = cursor.number(2).unwrap_or(1);
        let hour = cursor.number(2).unwrap_or(0);
        let minute = cursor.number(2).unwrap_or(0);
        let second = cursor.number(2).unwrap_or(0);

        let offset = match cursor.advance() {
            Some(sign @ (b'+' | b'-')) => {
                let hours = cursor.number(2).unwrap_or(0) as i32;
                cursor.skip(b'\'');
                let minutes = cursor.number(2).unwrap_or(0) as i32;
                let seconds = (hours * 60 + minutes) * 60;
                if sign == b'-' {
                    -seconds
                } else {
                    seconds
                }
            }
            _ => 0,
        };

        FixedOffset::east_opt(offset)?
            .with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
    }
}

struct DateCursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl DateCursor<'_> {
    fn number(&mut self, digits: usize) -> Option<u32> {
        let run = self.bytes.get(self.position..self.position + digits)?;
        if !run.iter().all(u8::is_ascii_digit) {
            return None;
        }
        self.position += digits;
        Some(run.iter().fold(0, |acc, d| acc * 10 + u32::from(d - b'0')))
    }

    fn advance(&mut self) -> Option<u8> {
        let byte = *self.bytes.get(self.position)?;
        self.position += 1;
        Some(byte)
    }

    fn skip(&mut self, byte: u8) {
        if self.bytes.get(self.position) == Some(&byte) {
            self.position += 1;
        }
    }
}
