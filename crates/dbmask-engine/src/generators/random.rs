use rand::Rng;

use dbmask_config::Bound;
use dbmask_core::{SqlValue, TypeFamily};

use crate::errors::GenerationError;
use crate::generators::{Constraints, GeneratorKind, RandomKind, round_to_scale};

const DEFAULT_NUMBER_RANGE: (i64, i64) = (0, 10_000);
const HEX_ALPHABET: &str = "0123456789abcdef";
const DIGITS: &[u8] = b"0123456789";
const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub fn generate<R: Rng>(
    kind: RandomKind,
    constraints: &Constraints,
    rng: &mut R,
) -> Result<SqlValue, GenerationError> {
    let generator = GeneratorKind::Random(kind);
    let value = match kind {
        RandomKind::Number => {
            let (min, max) = integer_bounds(generator, constraints, DEFAULT_NUMBER_RANGE)?;
            SqlValue::Int(rng.random_range(min..=max))
        }
        RandomKind::Byte => {
            let (min, max) = integer_bounds(generator, constraints, (0, 255))?;
            SqlValue::Int(rng.random_range(min.clamp(0, 255)..=max.clamp(0, 255)))
        }
        RandomKind::Decimal => {
            let (min, max) = float_bounds(generator, constraints, (0.0, 10_000.0))?;
            let value = if min == max {
                min
            } else {
                rng.random_range(min..=max)
            };
            let scale = constraints.numeric_scale.unwrap_or(2);
            SqlValue::Float(round_to_scale(value, scale))
        }
        RandomKind::Bool => SqlValue::Bool(rng.random_bool(0.5)),
        RandomKind::String => {
            let (min, max) = constraints.string_length_range(generator);
            let len = rng.random_range(min..=max);
            SqlValue::Text(random_string(constraints.alphabet(), len, rng))
        }
        RandomKind::Hexadecimal => {
            let (min, max) = constraints.string_length_range(generator);
            let len = rng.random_range(min..=max);
            let alphabet = constraints
                .character_string
                .as_deref()
                .unwrap_or(HEX_ALPHABET);
            SqlValue::Text(random_string(alphabet, len, rng))
        }
        RandomKind::Guid => SqlValue::Uuid(random_uuid(rng)),
        RandomKind::Format => {
            let pattern = constraints.format.as_deref().unwrap_or("##########");
            SqlValue::Text(apply_format(pattern, rng))
        }
        RandomKind::Regex => {
            return Err(GenerationError::constraint(
                generator.to_string(),
                "regex values are produced by the column generator",
            ));
        }
    };
    Ok(value)
}

/// Inclusive integer bounds narrowed to the target integer type.
pub fn integer_bounds(
    kind: GeneratorKind,
    constraints: &Constraints,
    default: (i64, i64),
) -> Result<(i64, i64), GenerationError> {
    let mut min = bound_i64(constraints.min.as_ref(), kind, "MinValue")?.unwrap_or(default.0);
    let mut max = bound_i64(constraints.max.as_ref(), kind, "MaxValue")?.unwrap_or(default.1);
    if constraints.sql_type.family() == TypeFamily::Integer
        && let Some((type_min, type_max)) = constraints.sql_type.integer_range()
    {
        min = min.clamp(type_min, type_max);
        max = max.clamp(type_min, type_max);
    }
    if min > max {
        return Err(GenerationError::constraint(
            kind.to_string(),
            format!("min {min} is greater than max {max}"),
        ));
    }
    Ok((min, max))
}

pub fn float_bounds(
    kind: GeneratorKind,
    constraints: &Constraints,
    default: (f64, f64),
) -> Result<(f64, f64), GenerationError> {
    let parse = |bound: Option<&Bound>, label: &str| match bound {
        None => Ok(None),
        Some(bound) => bound.as_f64().map(Some).ok_or_else(|| {
            GenerationError::constraint(kind.to_string(), format!("{label} '{bound}' is not numeric"))
        }),
    };
    let min = parse(constraints.min.as_ref(), "MinValue")?.unwrap_or(default.0);
    let max = parse(constraints.max.as_ref(), "MaxValue")?.unwrap_or(default.1);
    if !(min.is_finite() && max.is_finite()) || min > max {
        return Err(GenerationError::constraint(
            kind.to_string(),
            format!("invalid range {min}..={max}"),
        ));
    }
    Ok((min, max))
}

fn bound_i64(
    bound: Option<&Bound>,
    kind: GeneratorKind,
    label: &str,
) -> Result<Option<i64>, GenerationError> {
    match bound {
        None => Ok(None),
        Some(bound) => bound.as_i64().map(Some).ok_or_else(|| {
            GenerationError::constraint(
                kind.to_string(),
                format!("{label} '{bound}' is not an integer"),
            )
        }),
    }
}

pub fn random_string<R: Rng>(alphabet: &str, len: usize, rng: &mut R) -> String {
    let chars: Vec<char> = alphabet.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    (0..len)
        .map(|_| chars[rng.random_range(0..chars.len())])
        .collect()
}

pub fn random_digits<R: Rng>(len: usize, rng: &mut R) -> String {
    (0..len)
        .map(|_| char::from(DIGITS[rng.random_range(0..DIGITS.len())]))
        .collect()
}

pub fn random_uuid<R: Rng>(rng: &mut R) -> String {
    let bytes: [u8; 16] = rng.random();
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}

/// Expand a format pattern: `#` digit, `?` letter, `*` either, `\` escapes.
pub fn apply_format<R: Rng>(pattern: &str, rng: &mut R) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '#' => out.push(char::from(DIGITS[rng.random_range(0..DIGITS.len())])),
            '?' => out.push(char::from(LETTERS[rng.random_range(0..LETTERS.len())])),
            '*' => {
                if rng.random_bool(0.5) {
                    out.push(char::from(DIGITS[rng.random_range(0..DIGITS.len())]));
                } else {
                    out.push(char::from(LETTERS[rng.random_range(0..LETTERS.len())]));
                }
            }
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            other => out.push(other),
        }
    }
    out
}
