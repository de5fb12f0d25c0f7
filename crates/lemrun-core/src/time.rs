use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Wall-clock limit in the scheduler's `[days-]hours:minutes:seconds` notation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeLimit(Duration);

impl TimeLimit {
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time limit {0:?}: expected [days-]hours:minutes:seconds")]
pub struct ParseTimeLimitError(pub String);

impl FromStr for TimeLimit {
    type Err = ParseTimeLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTimeLimitError(s.to_string());
        let raw = s.trim();
        let (days, clock) = match raw.split_once('-') {
            Some((d, rest)) => (d.parse::<u64>().map_err(|_| err())?, rest),
            None => (0, raw),
        };

        let parts: Vec<&str> = clock.split(':').collect();
        if parts.len() != 3 {
            return Err(err());
        }
        let mut fields = [0u64; 3];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(err());
            }
            *slot = part.parse().map_err(|_| err())?;
        }
        let [h, m, sec] = fields;
        if m >= 60 || sec >= 60 {
            return Err(err());
        }
        let total = days
            .checked_mul(24)
            .and_then(|v| v.checked_add(h))
            .and_then(|v| v.checked_mul(60))
            .and_then(|v| v.checked_add(m))
            .and_then(|v| v.checked_mul(60))
            .and_then(|v| v.checked_add(sec))
            .ok_or_else(err)?;
        Ok(Self::from_secs(total))
    }
}

// Always prints hours:minutes:seconds; hours may exceed 24.
impl fmt::Display for TimeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.as_secs();
        write!(f, "{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
    }
}

impl Serialize for TimeLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeLimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_clock() {
        let t: TimeLimit = "24:00:00".parse().unwrap();
        assert_eq!(t.as_duration(), Duration::from_secs(86_400));
        assert_eq!(t.to_string(), "24:00:00");
    }

    #[test]
    fn parses_day_prefix() {
        let t: TimeLimit = "2-01:30:05".parse().unwrap();
        assert_eq!(t.as_duration().as_secs(), 2 * 86_400 + 3600 + 30 * 60 + 5);
        assert_eq!(t.to_string(), "49:30:05");
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "10", "1:2", "aa:00:00", "01:60:00", "01:00:75", "x-01:00:00", "01::00"] {
            assert!(bad.parse::<TimeLimit>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn rejects_values_that_overflow_seconds() {
        for bad in ["18446744073709551615-00:00:00", "18446744073709551615:00:00", "213503982334602-00:00:00"] {
            assert!(bad.parse::<TimeLimit>().is_err(), "{bad:?} should not parse");
        }
    }
}
