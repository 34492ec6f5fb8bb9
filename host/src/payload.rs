// Proof payload wire codec.
//
//   bytes[0..4)     u32 BE public signal count N
//   bytes[4..68)    A  (G1: x, y)
//   bytes[68..196)  B  (G2: x.c1, x.c0, y.c1, y.c0)
//   bytes[196..260) C  (G1: x, y)
//   bytes[260..)    N signals
//
// Every element is a 32-byte big-endian field element. Signals are written
// in wire order, which differs from the circuit's output order; wire
// signals 0..3 are always the commitment and public-inputs-hash limbs.

use duel_core::commitment::{field_modulus, limb_field_bytes};
use duel_core::{split_limbs, Commitment, GameKind, Move, Outcome};
use num_bigint::BigUint;
use thiserror::Error;

use crate::error::ClientError;
use crate::proofs::{G1Point, G2Point, Groth16Proof};

pub const HEADER_BYTES: usize = 4;
pub const FR_BYTES: usize = 32;
pub const G1_BYTES: usize = 2 * FR_BYTES;
pub const G2_BYTES: usize = 4 * FR_BYTES;
pub const PROOF_BYTES: usize = G1_BYTES + G2_BYTES + G1_BYTES;
pub const SIGNALS_OFFSET: usize = HEADER_BYTES + PROOF_BYTES;

pub const SHOT_SIGNALS: usize = 8;
pub const GUESS_SIGNALS: usize = 15;

/// `table[internal] = wire` for the shot circuit:
/// `[is_hit, sunk, c_hi, c_lo, h_hi, h_lo, x, y]` ->
/// `[c_hi, c_lo, h_hi, h_lo, x, y, is_hit, sunk]`.
const SHOT_WIRE_ORDER: [usize; SHOT_SIGNALS] = [6, 7, 0, 1, 2, 3, 4, 5];

/// `table[internal] = wire` for the guess circuit:
/// `[fb0..fb4, is_correct, c_hi, c_lo, h_hi, h_lo, g0..g4]` ->
/// `[c_hi, c_lo, h_hi, h_lo, g0..g4, fb0..fb4, is_correct]`.
const GUESS_WIRE_ORDER: [usize; GUESS_SIGNALS] = [9, 10, 11, 12, 13, 14, 0, 1, 2, 3, 4, 5, 6, 7, 8];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("expected {expected} public signals, got {got}")]
    SignalCount { expected: usize, got: usize },
    #[error("payload is {got} bytes, expected {expected}")]
    Length { expected: usize, got: usize },
    #[error("{0:?} is not a field element")]
    NotAFieldElement(String),
    #[error("binding signals do not match the commitment and public-inputs hash")]
    BindingMismatch,
    #[error("public signals do not match the claimed outcome")]
    OutcomeMismatch,
}

impl From<PayloadError> for ClientError {
    fn from(err: PayloadError) -> Self {
        ClientError::ProofGenerationFailure(err.to_string())
    }
}

pub fn signal_count(kind: GameKind) -> usize {
    wire_order(kind).len()
}

fn wire_order(kind: GameKind) -> &'static [usize] {
    match kind {
        GameKind::Battleship => &SHOT_WIRE_ORDER,
        GameKind::Wordle => &GUESS_WIRE_ORDER,
    }
}

/// Moves circuit-order signals into wire order.
pub fn to_wire_order<T: Clone>(kind: GameKind, internal: &[T]) -> Result<Vec<T>, PayloadError> {
    let table = wire_order(kind);
    if internal.len() != table.len() {
        return Err(PayloadError::SignalCount { expected: table.len(), got: internal.len() });
    }
    let mut wire = internal.to_vec();
    for (i, value) in internal.iter().enumerate() {
        wire[table[i]] = value.clone();
    }
    Ok(wire)
}

fn field_bytes(decimal: &str) -> Result<[u8; 32], PayloadError> {
    let value = BigUint::parse_bytes(decimal.trim().as_bytes(), 10)
        .ok_or_else(|| PayloadError::NotAFieldElement(decimal.to_string()))?;
    if value >= field_modulus() {
        return Err(PayloadError::NotAFieldElement(decimal.to_string()));
    }
    let bytes = value.to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

fn push_g1(out: &mut Vec<u8>, p: &G1Point) -> Result<(), PayloadError> {
    out.extend_from_slice(&field_bytes(&p.x)?);
    out.extend_from_slice(&field_bytes(&p.y)?);
    Ok(())
}

// Imaginary limb first.
fn push_g2(out: &mut Vec<u8>, p: &G2Point) -> Result<(), PayloadError> {
    out.extend_from_slice(&field_bytes(&p.x[1])?);
    out.extend_from_slice(&field_bytes(&p.x[0])?);
    out.extend_from_slice(&field_bytes(&p.y[1])?);
    out.extend_from_slice(&field_bytes(&p.y[0])?);
    Ok(())
}

/// Encodes `proof` with `public_signals` given in the circuit's order.
pub fn serialize(kind: GameKind, proof: &Groth16Proof, public_signals: &[String]) -> Result<Vec<u8>, PayloadError> {
    let wire = to_wire_order(kind, public_signals)?;
    let mut out = Vec::with_capacity(SIGNALS_OFFSET + FR_BYTES * wire.len());
    out.extend_from_slice(&(wire.len() as u32).to_be_bytes());
    push_g1(&mut out, &proof.a)?;
    push_g2(&mut out, &proof.b)?;
    push_g1(&mut out, &proof.c)?;
    for signal in &wire {
        out.extend_from_slice(&field_bytes(signal)?);
    }
    Ok(out)
}

/// Raw pieces of a payload. Points stay in their wire byte form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadParts {
    pub a: [u8; G1_BYTES],
    pub b: [u8; G2_BYTES],
    pub c: [u8; G1_BYTES],
    /// Wire order.
    pub signals: Vec<[u8; 32]>,
}

fn array<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

/// Inverse of [`serialize`], as the verifier side reads it.
pub fn parse(bytes: &[u8]) -> Result<PayloadParts, PayloadError> {
    if bytes.len() < SIGNALS_OFFSET {
        return Err(PayloadError::Length { expected: SIGNALS_OFFSET, got: bytes.len() });
    }
    let count = u32::from_be_bytes(array::<4>(bytes, 0)) as usize;
    let expected = count
        .checked_mul(FR_BYTES)
        .and_then(|n| n.checked_add(SIGNALS_OFFSET))
        .ok_or(PayloadError::Length { expected: usize::MAX, got: bytes.len() })?;
    if bytes.len() != expected {
        return Err(PayloadError::Length { expected, got: bytes.len() });
    }

    let signals = (0..count)
        .map(|i| array::<FR_BYTES>(bytes, SIGNALS_OFFSET + i * FR_BYTES))
        .collect();
    Ok(PayloadParts {
        a: array::<G1_BYTES>(bytes, HEADER_BYTES),
        b: array::<G2_BYTES>(bytes, HEADER_BYTES + G1_BYTES),
        c: array::<G1_BYTES>(bytes, HEADER_BYTES + G1_BYTES + G2_BYTES),
        signals,
    })
}

/// Wire signals 0..3 must be the right-aligned limbs of the commitment and
/// the public-inputs hash.
pub fn check_binding(signals: &[[u8; 32]], commitment: &Commitment, pi_hash: &[u8; 32]) -> Result<(), PayloadError> {
    if signals.len() < 4 {
        return Err(PayloadError::BindingMismatch);
    }
    let (c_hi, c_lo) = split_limbs(commitment.as_bytes());
    let (h_hi, h_lo) = split_limbs(pi_hash);
    let expected = [c_hi, c_lo, h_hi, h_lo].map(limb_field_bytes);
    if signals[..4] != expected {
        return Err(PayloadError::BindingMismatch);
    }
    Ok(())
}

fn small(v: u32) -> [u8; 32] {
    limb_field_bytes(v as u128)
}

/// Wire signals a proof for `(action, outcome)` has to carry.
pub fn expected_wire_signals(
    action: &Move,
    outcome: &Outcome,
    commitment: &Commitment,
    pi_hash: &[u8; 32],
) -> Result<Vec<[u8; 32]>, PayloadError> {
    let (c_hi, c_lo) = split_limbs(commitment.as_bytes());
    let (h_hi, h_lo) = split_limbs(pi_hash);
    let mut out: Vec<[u8; 32]> = [c_hi, c_lo, h_hi, h_lo].map(limb_field_bytes).to_vec();
    match (action, outcome) {
        (Move::Shot(target), Outcome::Shot { hit, sunk }) => {
            out.push(small(target.x));
            out.push(small(target.y));
            out.push(small(*hit as u32));
            out.push(small(sunk.map(|s| s.id()).unwrap_or(0)));
        }
        (Move::Guess(guess), Outcome::Guess { feedback, is_correct }) => {
            out.extend(guess.letters().iter().map(|l| small(*l as u32)));
            out.extend(feedback.iter().map(|s| small(s.as_u32())));
            out.push(small(*is_correct as u32));
        }
        _ => return Err(PayloadError::OutcomeMismatch),
    }
    Ok(out)
}
