// Already-targeted bitmaps.
//
// The ledger keeps one `u128` per firing direction; bit `row * width + col`
// is set once that cell has been resolved. For the letter game the same
// encoding is used with `width = ALPHABET_SIZE, height = 1`, one bit per
// guessed letter. Bits are only ever set.

use std::collections::BTreeSet;

use crate::board::Position;
use crate::error::RuleViolation;

const BITS: u32 = u128::BITS;

/// Every coordinate whose bit is set. Total over the full `u128` range: bits
/// at or beyond `width * height` carry no coordinate and are skipped.
pub fn decode(bitmap: u128, width: u32, height: u32) -> BTreeSet<Position> {
    let area = width.saturating_mul(height).min(BITS);
    (0..area)
        .filter(|i| bitmap & (1u128 << i) != 0)
        .map(|i| Position::new(i % width, i / width))
        .collect()
}

/// Inverse of [`decode`]. The chain owns bitmap mutation; this exists for
/// the in-process ledger and tests.
pub fn encode<'a, I>(cells: I, width: u32, height: u32) -> Result<u128, RuleViolation>
where
    I: IntoIterator<Item = &'a Position>,
{
    cells
        .into_iter()
        .try_fold(0u128, |acc, pos| Ok(acc | bit(*pos, width, height)?))
}

/// Single-bit mask for `pos`.
pub fn bit(pos: Position, width: u32, height: u32) -> Result<u128, RuleViolation> {
    if pos.x >= width || pos.y >= height {
        return Err(RuleViolation::InvalidCoordinate);
    }
    let index = pos.y * width + pos.x;
    if index >= BITS {
        return Err(RuleViolation::InvalidCoordinate);
    }
    Ok(1u128 << index)
}

pub fn is_set(bitmap: u128, pos: Position, width: u32, height: u32) -> bool {
    bit(pos, width, height).map(|b| bitmap & b != 0).unwrap_or(false)
}
