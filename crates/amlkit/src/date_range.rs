//! AML conditions and relative/fixed date ranges
//!
//! A date range assigned to a property (or bound to a parameter) is written as
//! a `condition` attribute plus the computed bound text. Dynamic ranges also
//! carry an `origDateRange` attribute so the relative definition survives a
//! round trip through the server.

use std::fmt;
use std::str::FromStr;

use time::{Date, Duration, Month, PrimitiveDateTime, Time, Weekday};

use crate::error::{Error, ErrorKind, Result, Span};

/// Comparison semantics of a property used in a query
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Condition {
    #[default]
    Undefined,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    NotBetween,
    IsNull,
    IsNotNull,
    Is,
}

impl Condition {
    /// The AML attribute text, or `None` for [`Condition::Undefined`]
    pub const fn as_aml(&self) -> Option<&'static str> {
        match self {
            Self::Undefined => None,
            Self::Eq => Some("eq"),
            Self::Ne => Some("ne"),
            Self::Gt => Some("gt"),
            Self::Ge => Some("ge"),
            Self::Lt => Some("lt"),
            Self::Le => Some("le"),
            Self::Like => Some("like"),
            Self::NotLike => Some("not like"),
            Self::In => Some("in"),
            Self::NotIn => Some("not in"),
            Self::Between => Some("between"),
            Self::NotBetween => Some("not between"),
            Self::IsNull => Some("is null"),
            Self::IsNotNull => Some("is not null"),
            Self::Is => Some("is"),
        }
    }
}

impl FromStr for Condition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let condition = match s.trim().to_ascii_lowercase().as_str() {
            "eq" | "=" => Self::Eq,
            "ne" | "<>" | "!=" => Self::Ne,
            "gt" | ">" => Self::Gt,
            "ge" | ">=" => Self::Ge,
            "lt" | "<" => Self::Lt,
            "le" | "<=" => Self::Le,
            "like" => Self::Like,
            "not like" => Self::NotLike,
            "in" => Self::In,
            "not in" => Self::NotIn,
            "between" => Self::Between,
            "not between" => Self::NotBetween,
            "is null" => Self::IsNull,
            "is not null" => Self::IsNotNull,
            "is" => Self::Is,
            _ => {
                return Err(Error::new(
                    ErrorKind::InvalidValue {
                        target: "condition",
                    },
                    Span::empty(),
                ))
            }
        };
        Ok(condition)
    }
}

/// Unit a dynamic date range offset is counted in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DateMagnitude {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl fmt::Display for DateMagnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Day => "Day",
            Self::Week => "Week",
            Self::Month => "Month",
            Self::Quarter => "Quarter",
            Self::Year => "Year",
        };
        f.write_str(name)
    }
}

impl FromStr for DateMagnitude {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "quarter" => Ok(Self::Quarter),
            "year" => Ok(Self::Year),
            _ => Err(Error::new(ErrorKind::InvalidDateRange, Span::empty())),
        }
    }
}

/// Offsets of this many years or more mark an open bound
const OPEN_YEARS: i32 = 1000;

/// A date range relative to "now", e.g. "last month" or "the next two weeks"
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DynamicDateRange {
    pub start_magnitude: DateMagnitude,
    pub start_offset: i32,
    pub end_magnitude: DateMagnitude,
    pub end_offset: i32,
    pub first_day_of_week: Weekday,
}

impl Default for DynamicDateRange {
    fn default() -> Self {
        Self {
            start_magnitude: DateMagnitude::Year,
            start_offset: -OPEN_YEARS,
            end_magnitude: DateMagnitude::Year,
            end_offset: OPEN_YEARS,
            first_day_of_week: Weekday::Sunday,
        }
    }
}

impl DynamicDateRange {
    /// Range covering whole periods from `start_offset` to `end_offset`
    pub fn new(
        start_magnitude: DateMagnitude,
        start_offset: i32,
        end_magnitude: DateMagnitude,
        end_offset: i32,
    ) -> Self {
        Self {
            start_magnitude,
            start_offset,
            end_magnitude,
            end_offset,
            ..Self::default()
        }
    }

    /// Range with only a lower bound
    pub fn starting(magnitude: DateMagnitude, offset: i32) -> Self {
        Self {
            start_magnitude: magnitude,
            start_offset: offset,
            ..Self::default()
        }
    }

    /// Range with only an upper bound
    pub fn ending(magnitude: DateMagnitude, offset: i32) -> Self {
        Self {
            end_magnitude: magnitude,
            end_offset: offset,
            ..Self::default()
        }
    }

    pub fn with_first_day_of_week(mut self, weekday: Weekday) -> Self {
        self.first_day_of_week = weekday;
        self
    }

    pub fn is_start_open(&self) -> bool {
        self.start_magnitude == DateMagnitude::Year && self.start_offset <= -OPEN_YEARS
    }

    pub fn is_end_open(&self) -> bool {
        self.end_magnitude == DateMagnitude::Year && self.end_offset >= OPEN_YEARS
    }

    pub fn condition(&self) -> Condition {
        match (self.is_start_open(), self.is_end_open()) {
            (true, true) => Condition::Undefined,
            (true, false) => Condition::Le,
            (false, true) => Condition::Ge,
            (false, false) => Condition::Between,
        }
    }

    /// Compute the local bounds of the range relative to `now`.
    ///
    /// The lower bound is the first instant of the start period; the upper
    /// bound is the last second of the end period.
    pub fn evaluate(
        &self,
        now: PrimitiveDateTime,
    ) -> Result<(Option<PrimitiveDateTime>, Option<PrimitiveDateTime>)> {
        let today = now.date();
        let start = if self.is_start_open() {
            None
        } else {
            let date = self.period_start(today, self.start_magnitude, self.start_offset)?;
            Some(PrimitiveDateTime::new(date, Time::MIDNIGHT))
        };
        let end = if self.is_end_open() {
            None
        } else {
            let next = self.period_start(
                today,
                self.end_magnitude,
                self.end_offset.saturating_add(1),
            )?;
            PrimitiveDateTime::new(next, Time::MIDNIGHT)
                .checked_sub(Duration::SECOND)
                .map(Some)
                .ok_or_else(range_error)?
        };
        Ok((start, end))
    }

    fn period_start(&self, today: Date, magnitude: DateMagnitude, offset: i32) -> Result<Date> {
        let offset = i64::from(offset);
        match magnitude {
            DateMagnitude::Day => today
                .checked_add(Duration::days(offset))
                .ok_or_else(range_error),
            DateMagnitude::Week => {
                let back = (i64::from(today.weekday().number_days_from_sunday())
                    - i64::from(self.first_day_of_week.number_days_from_sunday()))
                .rem_euclid(7);
                today
                    .checked_sub(Duration::days(back))
                    .and_then(|d| d.checked_add(Duration::weeks(offset)))
                    .ok_or_else(range_error)
            }
            DateMagnitude::Month => add_months(today.year(), today.month(), offset),
            DateMagnitude::Quarter => {
                let quarter_month = (u8::from(today.month()) - 1) / 3 * 3 + 1;
                let month = Month::try_from(quarter_month).map_err(|_| range_error())?;
                add_months(today.year(), month, offset.saturating_mul(3))
            }
            DateMagnitude::Year => {
                let year = i64::from(today.year()).saturating_add(offset);
                let year = i32::try_from(year).map_err(|_| range_error())?;
                Date::from_calendar_date(year, Month::January, 1).map_err(|_| range_error())
            }
        }
    }

    /// Serialize to the `origDateRange` attribute format
    pub fn serialize(&self) -> String {
        let mut text = format!(
            "Dynamic|{}|{}|{}|{}",
            self.start_magnitude, self.start_offset, self.end_magnitude, self.end_offset
        );
        if self.first_day_of_week != Weekday::Sunday {
            text.push('|');
            text.push_str(weekday_name(self.first_day_of_week));
        }
        text
    }

    /// Parse an `origDateRange` attribute value.
    ///
    /// Accepts `Dynamic|<mag>|<offset>|<mag>|<offset>[|<weekday>]` and the
    /// older `<mag>|<offset>|<mag>|<offset>|<weekday>` form.
    pub fn deserialize(value: &str) -> Option<Self> {
        let mut parts: Vec<&str> = value.split('|').map(str::trim).collect();
        if parts.first().is_some_and(|p| p.eq_ignore_ascii_case("dynamic")) {
            parts.remove(0);
        }
        if parts.len() != 4 && parts.len() != 5 {
            return None;
        }

        let first_day_of_week = match parts.get(4) {
            Some(name) => parse_weekday(name)?,
            None => Weekday::Sunday,
        };
        Some(Self {
            start_magnitude: parts.first()?.parse().ok()?,
            start_offset: parts.get(1)?.parse().ok()?,
            end_magnitude: parts.get(2)?.parse().ok()?,
            end_offset: parts.get(3)?.parse().ok()?,
            first_day_of_week,
        })
    }
}

/// A date range between fixed bounds, either of which may be absent
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StaticDateRange {
    pub start: Option<PrimitiveDateTime>,
    pub end: Option<PrimitiveDateTime>,
}

impl StaticDateRange {
    pub const fn new(start: Option<PrimitiveDateTime>, end: Option<PrimitiveDateTime>) -> Self {
        Self { start, end }
    }

    pub fn condition(&self) -> Condition {
        match (self.start.is_some(), self.end.is_some()) {
            (true, true) => Condition::Between,
            (true, false) => Condition::Ge,
            (false, true) => Condition::Le,
            (false, false) => Condition::Undefined,
        }
    }
}

fn add_months(year: i32, month: Month, offset: i64) -> Result<Date> {
    let total = i64::from(year) * 12 + i64::from(u8::from(month)) - 1 + offset;
    let year = i32::try_from(total.div_euclid(12)).map_err(|_| range_error())?;
    let month = u8::try_from(total.rem_euclid(12) + 1)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .ok_or_else(range_error)?;
    Date::from_calendar_date(year, month, 1).map_err(|_| range_error())
}

fn range_error() -> Error {
    Error::new(ErrorKind::InvalidDateRange, Span::empty())
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Monday => "Monday",
        Weekday::Tuesday => "Tuesday",
        Weekday::Wednesday => "Wednesday",
        Weekday::Thursday => "Thursday",
        Weekday::Friday => "Friday",
        Weekday::Saturday => "Saturday",
        Weekday::Sunday => "Sunday",
    }
}

fn parse_weekday(name: &str) -> Option<Weekday> {
    let weekday = match name.to_ascii_lowercase().as_str() {
        "monday" => Weekday::Monday,
        "tuesday" => Weekday::Tuesday,
        "wednesday" => Weekday::Wednesday,
        "thursday" => Weekday::Thursday,
        "friday" => Weekday::Friday,
        "saturday" => Weekday::Saturday,
        "sunday" => Weekday::Sunday,
        _ => return None,
    };
    Some(weekday)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_last_month() -> Result<()> {
        let range = DynamicDateRange::new(DateMagnitude::Month, -1, DateMagnitude::Month, -1);
        let (start, end) = range.evaluate(datetime!(2016-06-20 14:42:14))?;
        assert_eq!(start, Some(datetime!(2016-05-01 0:00:00)));
        assert_eq!(end, Some(datetime!(2016-05-31 23:59:59)));
        assert_eq!(range.condition(), Condition::Between);
        Ok(())
    }

    #[test]
    fn test_open_start_week_range() -> Result<()> {
        let range = DynamicDateRange::ending(DateMagnitude::Week, 2);
        let (start, end) = range.evaluate(datetime!(2016-11-10 13:16:54))?;
        assert_eq!(start, None);
        assert_eq!(end, Some(datetime!(2016-11-26 23:59:59)));
        assert_eq!(range.condition(), Condition::Le);
        Ok(())
    }

    #[test]
    fn test_open_end_week_range() -> Result<()> {
        let range = DynamicDateRange::starting(DateMagnitude::Week, -2);
        let (start, end) = range.evaluate(datetime!(2016-11-10 13:16:54))?;
        assert_eq!(start, Some(datetime!(2016-10-23 0:00:00)));
        assert_eq!(end, None);
        assert_eq!(range.condition(), Condition::Ge);
        Ok(())
    }

    #[test]
    fn test_week_starting_monday() -> Result<()> {
        let range = DynamicDateRange::new(DateMagnitude::Week, 0, DateMagnitude::Week, 0)
            .with_first_day_of_week(Weekday::Monday);
        let (start, end) = range.evaluate(datetime!(2016-11-13 08:00:00))?;
        assert_eq!(start, Some(datetime!(2016-11-07 0:00:00)));
        assert_eq!(end, Some(datetime!(2016-11-13 23:59:59)));
        Ok(())
    }

    #[test]
    fn test_quarter_and_year() -> Result<()> {
        let range = DynamicDateRange::new(DateMagnitude::Quarter, -1, DateMagnitude::Year, 0);
        let (start, end) = range.evaluate(datetime!(2017-02-15 12:00:00))?;
        assert_eq!(start, Some(datetime!(2016-10-01 0:00:00)));
        assert_eq!(end, Some(datetime!(2017-12-31 23:59:59)));
        Ok(())
    }

    #[test]
    fn test_serialize_round_trip() {
        let range = DynamicDateRange::new(DateMagnitude::Month, -1, DateMagnitude::Month, -1);
        assert_eq!(range.serialize(), "Dynamic|Month|-1|Month|-1");
        assert_eq!(DynamicDateRange::deserialize(&range.serialize()), Some(range));

        let monday = range.with_first_day_of_week(Weekday::Monday);
        assert_eq!(monday.serialize(), "Dynamic|Month|-1|Month|-1|Monday");
        assert_eq!(DynamicDateRange::deserialize(&monday.serialize()), Some(monday));
    }

    #[test]
    fn test_deserialize_legacy_form() {
        let range = DynamicDateRange::deserialize("Month|-1|Month|-1|Sunday");
        assert_eq!(
            range,
            Some(DynamicDateRange::new(
                DateMagnitude::Month,
                -1,
                DateMagnitude::Month,
                -1
            ))
        );
        assert_eq!(DynamicDateRange::deserialize("random query"), None);
        assert_eq!(DynamicDateRange::deserialize("Dynamic|Month|x|Month|-1"), None);
    }

    #[test]
    fn test_static_conditions() {
        let start = Some(datetime!(2017-01-01 0:00:00));
        let end = Some(datetime!(2017-01-31 0:00:00));
        assert_eq!(StaticDateRange::new(start, end).condition(), Condition::Between);
        assert_eq!(StaticDateRange::new(start, None).condition(), Condition::Ge);
        assert_eq!(StaticDateRange::new(None, end).condition(), Condition::Le);
        assert_eq!(StaticDateRange::default().condition(), Condition::Undefined);
    }

    #[test]
    fn test_condition_text() -> Result<()> {
        assert_eq!(Condition::NotIn.as_aml(), Some("not in"));
        assert_eq!(Condition::Undefined.as_aml(), None);
        assert_eq!("Between".parse::<Condition>()?, Condition::Between);
        assert!("sideways".parse::<Condition>().is_err());
        Ok(())
    }
}
