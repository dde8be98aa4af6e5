//! Age expression parsing and cutoff computation.
//!
//! An age expression is a positive integer followed by `d`, `mo` or `y`.
//! Months and years are subtracted on the calendar, so `1mo` from March 31
//! lands on the last day of February rather than 30 days earlier.

use std::fmt;

use chrono::{DateTime, Days, Months, Utc};

use crate::error::{Result, SweepError};

/// Unit of an age expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeUnit {
    Days,
    Months,
    Years,
}

impl AgeUnit {
    fn suffix(self) -> &'static str {
        match self {
            AgeUnit::Days => "d",
            AgeUnit::Months => "mo",
            AgeUnit::Years => "y",
        }
    }
}

/// A parsed retention window such as `90d` or `6mo`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeSpan {
    pub magnitude: u32,
    pub unit: AgeUnit,
}

impl AgeSpan {
    /// Absolute cutoff: `run_start - self`, using calendar arithmetic
    pub fn cutoff_from(&self, run_start: DateTime<Utc>) -> Result<AgeCutoff> {
        let instant = match self.unit {
            AgeUnit::Days => run_start.checked_sub_days(Days::new(u64::from(self.magnitude))),
            AgeUnit::Months => run_start.checked_sub_months(Months::new(self.magnitude)),
            AgeUnit::Years => self
                .magnitude
                .checked_mul(12)
                .and_then(|months| run_start.checked_sub_months(Months::new(months))),
        };

        instant
            .map(AgeCutoff)
            .ok_or_else(|| SweepError::invalid_age(&self.to_string(), "cutoff is out of range"))
    }
}

impl fmt::Display for AgeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit.suffix())
    }
}

/// Point in time at or before which artifacts are eligible for deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AgeCutoff(pub DateTime<Utc>);

impl AgeCutoff {
    /// An artifact qualifies iff `created_at <= cutoff`
    pub fn admits(&self, created_at: DateTime<Utc>) -> bool {
        created_at <= self.0
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Parse an age expression like `6d`, `6mo` or `6y`
pub fn parse(expr: &str) -> Result<AgeSpan> {
    let split = expr.find(|c: char| !c.is_ascii_digit()).unwrap_or(expr.len());
    let (digits, unit) = expr.split_at(split);

    if digits.is_empty() {
        return Err(SweepError::invalid_age(expr, "expected a positive integer magnitude"));
    }

    let magnitude: u32 = digits
        .parse()
        .map_err(|_| SweepError::invalid_age(expr, "magnitude is too large"))?;
    if magnitude == 0 {
        return Err(SweepError::invalid_age(expr, "magnitude must be greater than zero"));
    }

    let unit = match unit {
        "d" => AgeUnit::Days,
        "mo" => AgeUnit::Months,
        "y" => AgeUnit::Years,
        "" => return Err(SweepError::invalid_age(expr, "missing unit (expected d, mo or y)")),
        other => {
            return Err(SweepError::invalid_age(
                expr,
                format!("unknown unit '{}' (expected d, mo or y)", other),
            ));
        }
    };

    Ok(AgeSpan { magnitude, unit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_valid_units() {
        assert_eq!(parse("6d").unwrap(), AgeSpan { magnitude: 6, unit: AgeUnit::Days });
        assert_eq!(parse("6mo").unwrap(), AgeSpan { magnitude: 6, unit: AgeUnit::Months });
        assert_eq!(parse("6y").unwrap(), AgeSpan { magnitude: 6, unit: AgeUnit::Years });
        assert_eq!(parse("90d").unwrap().magnitude, 90);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for expr in [
            "6x",
            "-6d",
            "six days",
            "",
            "d",
            "0d",
            "6",
            "6 d",
            "6D",
            "+6d",
            "6mos",
            "99999999999d",
        ] {
            let err = parse(expr).unwrap_err();
            assert!(
                matches!(err, SweepError::InvalidAgeExpression { .. }),
                "expected InvalidAgeExpression for {:?}",
                expr
            );
        }
    }

    #[test]
    fn test_display_round_trips_expression() {
        assert_eq!(parse("3mo").unwrap().to_string(), "3mo");
        assert_eq!(parse("1y").unwrap().to_string(), "1y");
    }

    #[test]
    fn test_cutoff_days() {
        let start = at(2024, 3, 10);
        let cutoff = parse("6d").unwrap().cutoff_from(start).unwrap();
        assert_eq!(cutoff.instant(), at(2024, 3, 4));
        assert!(cutoff.instant() < start);
    }

    #[test]
    fn test_cutoff_months_is_calendar_aware() {
        let start = at(2024, 8, 15);
        let cutoff = parse("6mo").unwrap().cutoff_from(start).unwrap();
        assert_eq!(cutoff.instant(), at(2024, 2, 15));

        // Clamped to the end of a shorter month, not a fixed 30-day span
        let cutoff = parse("1mo").unwrap().cutoff_from(at(2024, 3, 31)).unwrap();
        assert_eq!(cutoff.instant(), at(2024, 2, 29));
    }

    #[test]
    fn test_cutoff_years() {
        let start = at(2024, 8, 15);
        let cutoff = parse("6y").unwrap().cutoff_from(start).unwrap();
        assert_eq!(cutoff.instant(), at(2018, 8, 15));
    }

    #[test]
    fn test_cutoff_admits_boundary() {
        let cutoff = AgeCutoff(at(2024, 1, 1));
        assert!(cutoff.admits(at(2024, 1, 1)));
        assert!(cutoff.admits(at(2023, 12, 31)));
        assert!(!cutoff.admits(at(2024, 1, 2)));
    }
}
