//! # Value Parser
//!
//! Parses the value part of a `key:value` token into a composite of
//! alternatives, each either a single literal or a range:
//!
//! ```text
//! <composite>   ::= <alternative> { "," <alternative> }
//! <alternative> ::= <literal> [ ".." <literal> ]
//! <literal>     ::= { "\" <any> | <any but "," or "\" not starting ".."> }
//! ```
//!
//! Literals are then resolved according to the [`ValueKind`] of the targeted
//! column. Date literals are expanded to the full span their precision
//! denotes, so `2014` covers the whole year and `2014-06` the whole month.

use crate::query::{Column, Filter, Scalar};
use crate::search::SearchError;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag as t,
    character::complete::{anychar, char, digit1, none_of},
    combinator::{all_consuming, map_res, not, opt},
    multi::{many0, separated_list1},
    sequence::preceded,
};
use std::ops::Bound;
use std::str::FromStr;

/// How the literals of a filter value are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Plain text compared for equality. Ranges are rejected.
    Text,
    /// Signed decimal integers; single values and ranges.
    Integer,
    /// Calendar dates at year, month or day precision.
    Date,
}

/// One alternative of a composite value, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Single(String),
    /// `lo..hi`; a `None` bound is open.
    Range {
        lower: Option<String>,
        upper: Option<String>,
    },
}

/// Comma-separated alternatives, combined with logical OR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeValue(pub Vec<RawValue>);

impl CompositeValue {
    pub fn alternatives(&self) -> &[RawValue] {
        &self.0
    }
}

/// Parses a raw value string, unescaping literals.
///
/// # Errors
/// - the value (or one alternative) is empty
/// - a range has no bound at all (`..`)
/// - the value ends with a dangling `\` or holds a second `..`
pub fn parse_value(input: &str) -> Result<CompositeValue, SearchError> {
    let (_, alternatives) = all_consuming(separated_list1(char(','), alternative))
        .parse(input)
        .map_err(|_| SearchError::new(format!("Malformed value: {input:?}")))?;

    for alternative in &alternatives {
        match alternative {
            RawValue::Single(value) if value.is_empty() => {
                return Err(SearchError::new(format!("Empty value in {input:?}")));
            }
            RawValue::Range {
                lower: None,
                upper: None,
            } => {
                return Err(SearchError::new(format!(
                    "Range without bounds in {input:?}"
                )));
            }
            _ => {}
        }
    }

    Ok(CompositeValue(alternatives))
}

fn alternative(input: &str) -> IResult<&str, RawValue> {
    let (input, lower) = literal(input)?;
    let (input, upper) = opt(preceded(t(".."), literal)).parse(input)?;

    let value = match upper {
        None => RawValue::Single(lower),
        Some(upper) => RawValue::Range {
            lower: non_empty(lower),
            upper: non_empty(upper),
        },
    };

    Ok((input, value))
}

fn literal(input: &str) -> IResult<&str, String> {
    many0(alt((
        preceded(char('\\'), anychar),
        preceded(not(t("..")), none_of(",\\")),
    )))
    .map(|chars: Vec<char>| chars.into_iter().collect::<String>())
    .parse(input)
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Parses `raw` and builds the OR of one criterion per alternative against
/// `column`.
pub fn build_filter<C: Column>(
    column: C,
    kind: ValueKind,
    raw: &str,
) -> Result<Filter<C>, SearchError> {
    parse_value(raw)?
        .alternatives()
        .iter()
        .map(|value| criterion(column, kind, value))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .reduce(Filter::or)
        .ok_or_else(|| SearchError::new(format!("Empty value in {raw:?}")))
}

fn criterion<C: Column>(
    column: C,
    kind: ValueKind,
    value: &RawValue,
) -> Result<Filter<C>, SearchError> {
    match (kind, value) {
        (ValueKind::Text, RawValue::Single(text)) => Ok(Filter::equals(column, text.as_str())),
        (ValueKind::Text, RawValue::Range { .. }) => Err(SearchError::new(format!(
            "Ranged values are not supported for {column:?}"
        ))),
        (ValueKind::Integer, RawValue::Single(text)) => {
            let n = parse_integer(text)?;
            Ok(Filter::within(
                column,
                Bound::Included(Scalar::Integer(n)),
                Bound::Included(Scalar::Integer(n)),
            ))
        }
        (ValueKind::Integer, RawValue::Range { lower, upper }) => {
            let bound = |text: &Option<String>| -> Result<Bound<Scalar>, SearchError> {
                Ok(match text {
                    Some(text) => Bound::Included(Scalar::Integer(parse_integer(text)?)),
                    None => Bound::Unbounded,
                })
            };
            Ok(Filter::within(column, bound(lower)?, bound(upper)?))
        }
        (ValueKind::Date, RawValue::Single(text)) => {
            let span = parse_date(text)?;
            Ok(Filter::within(column, span.lower_bound(), span.upper_bound()))
        }
        (ValueKind::Date, RawValue::Range { lower, upper }) => {
            let lower = match lower {
                Some(text) => parse_date(text)?.lower_bound(),
                None => Bound::Unbounded,
            };
            let upper = match upper {
                Some(text) => parse_date(text)?.upper_bound(),
                None => Bound::Unbounded,
            };
            Ok(Filter::within(column, lower, upper))
        }
    }
}

fn parse_integer(text: &str) -> Result<i64, SearchError> {
    text.parse()
        .map_err(|_| SearchError::new(format!("Invalid integer: {text:?}")))
}

/// The inclusive range of days a date literal denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DateSpan {
    /// Midnight of the first day, inclusive.
    pub fn lower_bound(&self) -> Bound<Scalar> {
        Bound::Included(Scalar::Timestamp(start_of(self.first)))
    }

    /// Midnight after the last day, exclusive.
    pub fn upper_bound(&self) -> Bound<Scalar> {
        match self.last.succ_opt().filter(|next| next.year() <= MAX_YEAR) {
            Some(next) => Bound::Excluded(Scalar::Timestamp(start_of(next))),
            None => Bound::Unbounded,
        }
    }
}

fn start_of(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Latest year accepted in a date literal. Stored timestamps are compared as
/// `YYYY-MM-DD` text, which only orders correctly for four-digit years.
pub const MAX_YEAR: i32 = 9999;

/// Parses `YYYY`, `YYYY-MM` or `YYYY-MM-DD` into the span of days it covers.
pub fn parse_date(input: &str) -> Result<DateSpan, SearchError> {
    fn number<T: FromStr>(input: &str) -> IResult<&str, T> {
        map_res(digit1, |digits: &str| digits.parse::<T>()).parse(input)
    }

    let invalid = || SearchError::new(format!("Invalid date: {input:?}"));

    let (_, (year, month, day)) = all_consuming((
        number::<i32>,
        opt(preceded(char('-'), number::<u32>)),
        opt(preceded(char('-'), number::<u32>)),
    ))
    .parse(input)
    .map_err(|_| invalid())?;

    if !(0..=MAX_YEAR).contains(&year) {
        return Err(SearchError::new(format!("Year out of range: {input:?}")));
    }

    match (month, day) {
        (None, None) => Ok(DateSpan {
            first: NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?,
            last: NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(invalid)?,
        }),
        (Some(month), None) => {
            let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
            let next = if month == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(year, month + 1, 1)
            };
            let last = next.and_then(|d| d.pred_opt()).ok_or_else(invalid)?;
            Ok(DateSpan { first, last })
        }
        (Some(month), Some(day)) => {
            let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
            Ok(DateSpan {
                first: date,
                last: date,
            })
        }
        (None, Some(_)) => Err(invalid()),
    }
}
