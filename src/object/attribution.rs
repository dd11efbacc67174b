use std::fmt;
use std::str;

use chrono::{DateTime, FixedOffset, Local, Offset, TimeZone};

/// An `Attribution` combines a person's identity (name and e-mail address)
/// with the timestamp for a particular action.
///
/// Attributions are typically associated with commits or tags in git.
///
/// The `timestamp` value is in seconds relative to the Unix epoch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attribution {
    name: String,
    email: String,
    timestamp: i64,
    tz_offset: i16,
    // Git writes `-0000` when the zone is unknown; keep it so the header
    // renders back unchanged.
    negative_utc: bool,
}

impl Attribution {
    /// Creates a new attribution.
    ///
    /// Name and e-mail are sanitized (control characters and angle brackets
    /// removed, surrounding whitespace trimmed) so that the attribution always
    /// renders as a well-formed header value.
    ///
    /// # Panics
    ///
    /// Panics if `tz_offset` (minutes relative to GMT) is outside of -12:00..=+14:00.
    pub fn new(name: &str, email: &str, timestamp: i64, tz_offset: i16) -> Attribution {
        if !(-720..=840).contains(&tz_offset) {
            panic!("Illegal time zone offset: {}", tz_offset);
        }

        Attribution {
            name: sanitize(name),
            email: sanitize(email),
            timestamp,
            tz_offset,
            negative_utc: false,
        }
    }

    /// Creates an attribution stamped with the current local time.
    pub fn now(name: &str, email: &str) -> Attribution {
        let now = Local::now();
        let tz_offset = now.offset().fix().local_minus_utc() / 60;
        Attribution::new(name, email, now.timestamp(), tz_offset as i16)
    }

    /// Parse the value of an `author`, `committer` or `tagger` header.
    ///
    /// Returns `None` if the angle brackets around the e-mail are missing or
    /// the name or e-mail is not UTF-8. A missing or malformed timestamp or
    /// time zone reads as zero, and words between the e-mail and the
    /// timestamp are ignored. Well-formed values render back to the same
    /// bytes.
    pub fn parse(line: &[u8]) -> Option<Attribution> {
        let line = line.strip_suffix(b"\n").unwrap_or(line);

        let open = line.iter().position(|b| *b == b'<')?;
        let close = open + line[open..].iter().position(|b| *b == b'>')?;

        let name = &line[..open];
        let name = name.strip_suffix(b" ").unwrap_or(name);
        let email = &line[open + 1..close];

        let mut words = line[close + 1..]
            .rsplit(|b| *b == b' ')
            .filter(|word| !word.is_empty());
        let (tz_offset, negative_utc) = words.next().and_then(parse_tz).unwrap_or((0, false));
        let timestamp = words.next().and_then(parse_timestamp).unwrap_or(0);

        Some(Attribution {
            name: str::from_utf8(name).ok()?.to_string(),
            email: str::from_utf8(email).ok()?.to_string(),
            timestamp,
            tz_offset,
            negative_utc,
        })
    }

    /// Returns the person's human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the person's email address.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the timestamp.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Returns the timezone offset (minutes relative to GMT).
    pub fn tz_offset(&self) -> i16 {
        self.tz_offset
    }

    /// Returns the timestamp as a date and time in the attribution's own time zone.
    pub fn time(&self) -> Option<DateTime<FixedOffset>> {
        FixedOffset::east_opt(i32::from(self.tz_offset) * 60)
            .and_then(|tz| tz.timestamp_opt(self.timestamp, 0).single())
    }

    /// Returns the timezone formatted in human readable offset from GMT.
    pub fn format_tz(&self) -> String {
        let sign = if self.tz_offset < 0 || self.negative_utc {
            "-"
        } else {
            "+"
        };

        let offset = self.tz_offset.abs();
        let hours = offset / 60;
        let min = offset % 60;

        format!("{}{:02}{:02}", sign, hours, min)
    }
}

fn parse_timestamp(word: &[u8]) -> Option<i64> {
    str::from_utf8(word).ok()?.parse().ok()
}

/// `+hhmm` or `-hhmm` as minutes east of GMT, and whether it was `-0000`.
fn parse_tz(word: &[u8]) -> Option<(i16, bool)> {
    let (sign, digits) = match word {
        [b'+', rest @ ..] => (1, rest),
        [b'-', rest @ ..] => (-1, rest),
        _ => return None,
    };

    if digits.len() != 4 || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let n = |i: usize| i16::from(digits[i] - b'0');
    let minutes = (n(0) * 10 + n(1)) * 60 + n(2) * 10 + n(3);
    Some((sign * minutes, sign < 0 && minutes == 0))
}

fn sanitize(s: &str) -> String {
    let mut result = String::new();
    for c in s.trim().chars() {
        // Remove control characters except for CR and angle brackets.
        match c as u32 {
            0..=12 => (),
            14..=31 => (),
            60 | 62 => (),
            _ => result.push(c),
        }
    }
    result
}

impl fmt::Display for Attribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp,
            self.format_tz()
        )
    }
}
