use rand::Rng;
use rand::seq::SliceRandom;

use dbmask_core::SqlValue;

use crate::errors::GenerationError;
use crate::generators::{Constraints, GeneratorKind, coerce};

const SHUFFLE_ATTEMPTS: usize = 10;

/// Rearrange the alphanumeric characters of the current value.
///
/// Punctuation keeps its position so formatted values (phone numbers, codes)
/// keep their shape. A NULL source stays NULL. When no arrangement fits the
/// column type the source value is returned unchanged.
pub fn shuffle<R: Rng>(
    source: &SqlValue,
    kind: GeneratorKind,
    constraints: &Constraints,
    rng: &mut R,
) -> Result<SqlValue, GenerationError> {
    let Some(text) = source.canonical() else {
        return Ok(SqlValue::Null);
    };
    let chars: Vec<char> = text.chars().collect();
    let positions: Vec<usize> = chars
        .iter()
        .enumerate()
        .filter(|(_, ch)| ch.is_alphanumeric())
        .map(|(idx, _)| idx)
        .collect();

    for _ in 0..SHUFFLE_ATTEMPTS {
        let mut movable: Vec<char> = positions.iter().map(|idx| chars[*idx]).collect();
        movable.shuffle(rng);
        let mut shuffled = chars.clone();
        for (slot, ch) in positions.iter().zip(movable) {
            shuffled[*slot] = ch;
        }
        let candidate = SqlValue::Text(shuffled.into_iter().collect());
        if let Ok(value) = coerce(candidate, kind, constraints, rng) {
            return Ok(value);
        }
    }
    Ok(source.clone())
}
