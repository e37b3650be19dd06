use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rand::Rng;

use dbmask_config::Bound;
use dbmask_core::{SqlValue, parse_date_value, parse_datetime_value};

use crate::errors::GenerationError;
use crate::generators::{Constraints, DateKind, GeneratorKind};

const DEFAULT_WINDOW_DAYS: i64 = 365;
const NEAR_WINDOW_DAYS: i64 = 7;
const SECONDS_PER_DAY: u32 = 86_400;

pub fn generate<R: Rng>(
    kind: DateKind,
    constraints: &Constraints,
    rng: &mut R,
) -> Result<SqlValue, GenerationError> {
    let today = constraints.today;
    let (start, end) = match kind {
        DateKind::Time => return Ok(SqlValue::Time(random_time(rng))),
        DateKind::Past => (
            today - Duration::days(DEFAULT_WINDOW_DAYS),
            today - Duration::days(1),
        ),
        DateKind::Future => (
            today + Duration::days(1),
            today + Duration::days(DEFAULT_WINDOW_DAYS),
        ),
        DateKind::Recent => (today - Duration::days(NEAR_WINDOW_DAYS), today),
        DateKind::Soon => (today, today + Duration::days(NEAR_WINDOW_DAYS)),
        DateKind::Date | DateKind::Between => {
            let min = bound_date(constraints.min.as_ref(), kind, "MinValue")?;
            let max = bound_date(constraints.max.as_ref(), kind, "MaxValue")?;
            match (min, max) {
                (Some(min), Some(max)) => (min, max),
                (Some(min), None) => (min, min + Duration::days(DEFAULT_WINDOW_DAYS)),
                (None, Some(max)) => (max - Duration::days(DEFAULT_WINDOW_DAYS), max),
                (None, None) => (
                    today - Duration::days(DEFAULT_WINDOW_DAYS),
                    today + Duration::days(DEFAULT_WINDOW_DAYS),
                ),
            }
        }
    };
    if start > end {
        return Err(GenerationError::constraint(
            GeneratorKind::Date(kind).to_string(),
            format!("start {start} is after end {end}"),
        ));
    }
    let span = (end - start).num_days();
    let date = start + Duration::days(rng.random_range(0..=span));
    Ok(SqlValue::DateTime(NaiveDateTime::new(date, random_time(rng))))
}

fn random_time<R: Rng>(rng: &mut R) -> NaiveTime {
    let seconds = rng.random_range(0..SECONDS_PER_DAY);
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0).unwrap_or(NaiveTime::MIN)
}

fn bound_date(
    bound: Option<&Bound>,
    kind: DateKind,
    label: &str,
) -> Result<Option<NaiveDate>, GenerationError> {
    let Some(bound) = bound else {
        return Ok(None);
    };
    let text = bound.to_string();
    parse_date_value(text.trim())
        .or_else(|| parse_datetime_value(text.trim()).map(|value| value.date()))
        .map(Some)
        .ok_or_else(|| {
            GenerationError::constraint(
                GeneratorKind::Date(kind).to_string(),
                format!("{label} '{text}' is not a date"),
            )
        })
}
