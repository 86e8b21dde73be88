//! Cron-style schedule matching for rotation strategies.
//!
//! Only the five classic fields are supported (minute, hour, day-of-month,
//! month, day-of-week). The weekday field uses ISO numbering, so Monday is 1
//! and Sunday is 7; a literal `0` is accepted as Sunday as well.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, TimeZone, Timelike};

use super::RotationError;

/// Number of fields in a cleaned cron expression
pub const CRON_FIELDS: usize = 5;

/// A single parsed cron field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronField {
    /// `*`, matches every value
    Any,
    /// `1,5,10`
    List(Vec<u32>),
    /// `1-5`, inclusive on both ends. Inverted ranges never match.
    Range { start: u32, end: u32 },
    /// `*/15` (no base) or `5/10`
    Step { base: Option<u32>, step: u32 },
    /// A plain number
    Value(u32),
}

impl CronField {
    /// Parse the text of one field.
    ///
    /// The checks run in a fixed priority order: wildcard, list, range, step,
    /// plain number. A field such as `1-3,5` is therefore read as a list and
    /// rejected because `1-3` is not a number.
    pub fn parse(text: &str, is_weekday: bool) -> Result<Self, RotationError> {
        let text = text.trim();

        if text == "*" {
            return Ok(Self::Any);
        }

        if text.contains(',') {
            let values = text
                .split(',')
                .map(|part| parse_number(part.trim(), is_weekday, text))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Self::List(values));
        }

        if text.contains('-') {
            let (start, end) = split_pair(text, '-')?;
            return Ok(Self::Range {
                start: parse_number(start, is_weekday, text)?,
                end: parse_number(end, is_weekday, text)?,
            });
        }

        if text.contains('/') {
            let (base, step) = split_pair(text, '/')?;
            let step = parse_number(step, false, text)?;
            if step == 0 {
                return Err(RotationError::InvalidField(text.to_string()));
            }
            let base = match base {
                "*" => None,
                base => Some(parse_number(base, false, text)?),
            };
            return Ok(Self::Step { base, step });
        }

        parse_number(text, is_weekday, text).map(Self::Value)
    }

    /// Check a datetime component against this field
    pub fn matches(&self, value: u32) -> bool {
        match self {
            Self::Any => true,
            Self::List(values) => values.contains(&value),
            Self::Range { start, end } => *start <= value && value <= *end,
            Self::Step { base: None, step } => value % step == 0,
            Self::Step {
                base: Some(base),
                step,
            } => (i64::from(value) - i64::from(*base)).rem_euclid(i64::from(*step)) == 0,
            Self::Value(expected) => value == *expected,
        }
    }
}

fn split_pair(text: &str, separator: char) -> Result<(&str, &str), RotationError> {
    let mut parts = text.split(separator);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(left), Some(right), None) => Ok((left.trim(), right.trim())),
        _ => Err(RotationError::InvalidField(text.to_string())),
    }
}

fn parse_number(part: &str, is_weekday: bool, field: &str) -> Result<u32, RotationError> {
    // Sunday may be written as 0 or 7
    if is_weekday && part == "0" {
        return Ok(7);
    }
    part.parse::<u32>()
        .map_err(|_| RotationError::InvalidField(field.to_string()))
}

/// A validated 5-field cron expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    fields: [CronField; CRON_FIELDS],
}

impl CronExpression {
    /// Parse a cleaned (5-field) cron expression
    pub fn parse(expression: &str) -> Result<Self, RotationError> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != CRON_FIELDS {
            return Err(RotationError::FieldCount(expression.to_string()));
        }

        let fields = [
            CronField::parse(parts[0], false)?,
            CronField::parse(parts[1], false)?,
            CronField::parse(parts[2], false)?,
            CronField::parse(parts[3], false)?,
            CronField::parse(parts[4], true)?,
        ];

        Ok(Self {
            source: parts.join(" "),
            fields,
        })
    }

    /// The canonical text of the expression, fields separated by single spaces
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Parsed field by position, in `minute hour day month weekday` order
    pub fn field(&self, index: usize) -> Option<&CronField> {
        self.fields.get(index)
    }

    /// Whether the datetime satisfies all five fields
    pub fn matches<Tz: TimeZone>(&self, dt: &DateTime<Tz>) -> bool {
        let values = datetime_values(dt);
        self.fields
            .iter()
            .zip(values)
            .all(|(field, value)| field.matches(value))
    }
}

impl FromStr for CronExpression {
    type Err = RotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn datetime_values<Tz: TimeZone>(dt: &DateTime<Tz>) -> [u32; CRON_FIELDS] {
    [
        dt.minute(),
        dt.hour(),
        dt.day(),
        dt.month(),
        dt.weekday().number_from_monday(),
    ]
}

/// Match a raw cron field against one datetime component.
///
/// Fails if the field text cannot be parsed.
pub fn match_field(value: u32, field: &str, is_weekday: bool) -> Result<bool, RotationError> {
    let value = if is_weekday && value == 0 { 7 } else { value };
    Ok(CronField::parse(field, is_weekday)?.matches(value))
}

/// Check whether a datetime satisfies a 5-field cron expression
pub fn matches_cron<Tz: TimeZone>(expression: &str, dt: &DateTime<Tz>) -> Result<bool, RotationError> {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    if parts.len() != CRON_FIELDS {
        return Err(RotationError::FieldCount(expression.to_string()));
    }

    let values = datetime_values(dt);
    for (index, (part, value)) in parts.iter().zip(values).enumerate() {
        if !match_field(value, part, index == CRON_FIELDS - 1)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Return every expression matching the datetime, preserving input order
pub fn matches_crons<'a, S, Tz>(
    expressions: &'a [S],
    dt: &DateTime<Tz>,
) -> Result<Vec<&'a str>, RotationError>
where
    S: AsRef<str>,
    Tz: TimeZone,
{
    let mut matches = Vec::new();
    for expression in expressions {
        if matches_cron(expression.as_ref(), dt)? {
            matches.push(expression.as_ref());
        }
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_weekday_zero_and_seven_are_sunday() {
        assert!(match_field(0, "0", true).unwrap());
        assert!(match_field(7, "0", true).unwrap());
        assert!(match_field(7, "7", true).unwrap());
        assert!(match_field(7, "1,0", true).unwrap());
        assert!(match_field(0, "0", false).unwrap());
    }

    #[test]
    fn test_step_fields() {
        assert!(match_field(15, "*/15", false).unwrap());
        assert!(!match_field(16, "*/15", false).unwrap());
        assert!(match_field(0, "*/15", false).unwrap());
        assert!(match_field(15, "5/10", false).unwrap());
        assert!(!match_field(16, "5/10", false).unwrap());
        // Values below the base still follow the step
        assert!(match_field(1, "3/2", false).unwrap());
    }

    #[test]
    fn test_inverted_range_never_matches() {
        for hour in 0..24 {
            assert!(!match_field(hour, "22-2", false).unwrap());
        }
        assert!(match_field(3, "0-6", false).unwrap());
        assert!(!match_field(7, "0-6", false).unwrap());
    }

    #[test]
    fn test_unparseable_fields() {
        assert!(matches!(
            match_field(1, "abc", false),
            Err(RotationError::InvalidField(_))
        ));
        assert!(match_field(1, "1-3,5", false).is_err());
        assert!(match_field(1, "1-2-3", false).is_err());
        assert!(match_field(1, "*/0", false).is_err());
        assert!(match_field(1, "x/2", false).is_err());
    }

    #[test]
    fn test_matches_cron_requires_five_fields() {
        let dt = at(2025, 2, 24, 15, 38);
        assert!(matches!(
            matches_cron("* * * *", &dt),
            Err(RotationError::FieldCount(_))
        ));
        assert!(matches_cron("* * * * * 3", &dt).is_err());
    }

    #[test]
    fn test_matches_cron_cases() {
        // 2025-02-23 is a Sunday
        let sunday = at(2025, 2, 23, 3, 12);
        let saturday = at(2025, 2, 22, 12, 30);

        assert!(matches_cron("* * * * 7", &sunday).unwrap());
        assert!(!matches_cron("* * * * 7", &saturday).unwrap());
        assert!(matches_cron("* 0-6 * * 0", &sunday).unwrap());
        assert!(!matches_cron("* 0-6 * * 0", &at(2025, 2, 23, 7, 0)).unwrap());
        assert!(matches_cron("12 3 4 12 *", &at(2025, 12, 4, 3, 12)).unwrap());
        assert!(!matches_cron("12 3 4 12 *", &saturday).unwrap());
        assert!(matches_cron("5,10 2 1,2 * *", &at(2025, 12, 2, 2, 5)).unwrap());
        assert!(matches_cron("* 4 * * *", &at(2025, 2, 21, 4, 25)).unwrap());
        assert!(!matches_cron("30 * * * *", &at(2012, 7, 6, 9, 25)).unwrap());
    }

    #[test]
    fn test_matches_crons_preserves_order() {
        let dt = at(2025, 2, 24, 15, 38);
        let expressions = vec![
            "* * * 2 *",
            "38 15 * * *",
            "* 11 * * 1",
            "26 * 4 * *",
            "* * * * 1",
            "12 4 5 2 7",
            "* 0/3 * * *",
            "38 15 24 2 1",
            "* * 19 * 7",
            "* 10-15 * 2 *",
            "* * 2,24,28 1,2,3 *",
            "* * 2,28 1,2,3 *",
            "* * * * *",
        ];

        let matches = matches_crons(&expressions, &dt).unwrap();
        assert_eq!(
            matches,
            vec![
                "* * * 2 *",
                "38 15 * * *",
                "* * * * 1",
                "* 0/3 * * *",
                "38 15 24 2 1",
                "* 10-15 * 2 *",
                "* * 2,24,28 1,2,3 *",
                "* * * * *",
            ]
        );
    }

    #[test]
    fn test_parsed_expression_agrees_with_text_matching() {
        let dt = at(2025, 1, 5, 10, 18);
        for text in ["* * * 1 7", "18 10 5 1 *", "*/6 */5 * * 0", "* * * 2 *"] {
            let parsed = CronExpression::parse(text).unwrap();
            assert_eq!(parsed.matches(&dt), matches_cron(text, &dt).unwrap(), "{text}");
        }
    }

    #[test]
    fn test_expression_is_canonicalised() {
        let parsed: CronExpression = "  0   4 *  * 1 ".parse().unwrap();
        assert_eq!(parsed.as_str(), "0 4 * * 1");
        assert_eq!(parsed.to_string(), "0 4 * * 1");
        assert_eq!(parsed.field(4), Some(&CronField::Value(1)));
    }
}
