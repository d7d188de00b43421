//! Circular, fixed-width key addressing.
//!
//! A [`Position`] is an unsigned integer in the ring `[0, RADIX^WIDTH)` rendered
//! as exactly [`WIDTH`] base-36 characters. Two renderings only sort the same
//! way as their values within one trip around the ring, so callers must use
//! [`Position::distance_to`] instead of comparing keys.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Digits first, then uppercase letters.
pub const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Size of the key alphabet.
pub const RADIX: u64 = ALPHABET.len() as u64;

/// Number of characters in every rendered position.
pub const WIDTH: usize = 6;

/// One slot in the circular key space.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Position(u64);

impl Position {
    /// Number of distinct positions in the ring.
    pub const CAPACITY: u64 = RADIX.pow(WIDTH as u32);

    pub const ZERO: Position = Position(0);

    pub const MAX: Position = Position(Self::CAPACITY - 1);

    /// Build a position from its numeric value.
    pub fn new(value: u64) -> Result<Self, CoreError> {
        if value >= Self::CAPACITY {
            return Err(CoreError::invalid_position(format!(
                "{value} is outside [0, {})",
                Self::CAPACITY
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// The following slot, wrapping `MAX` to `ZERO`.
    pub fn next(self) -> Self {
        self.advance(1)
    }

    /// The preceding slot, wrapping `ZERO` to `MAX`.
    pub fn previous(self) -> Self {
        self.retreat(1)
    }

    /// Move `steps` slots forward around the ring.
    pub fn advance(self, steps: u64) -> Self {
        Self((self.0 + steps % Self::CAPACITY) % Self::CAPACITY)
    }

    /// Move `steps` slots backward around the ring.
    pub fn retreat(self, steps: u64) -> Self {
        Self((self.0 + Self::CAPACITY - steps % Self::CAPACITY) % Self::CAPACITY)
    }

    /// Forward circular distance from `self` to `other`, in `[0, CAPACITY)`.
    ///
    /// For a deque whose oldest element sits at `head` and newest at `tail`,
    /// `head.distance_to(tail) + 1` is the element count.
    #[doc(alias = "distance_to_head")]
    pub fn distance_to(self, other: Position) -> u64 {
        (other.0 + Self::CAPACITY - self.0) % Self::CAPACITY
    }

    /// Fixed-width key used in the backing store.
    pub fn key(self) -> String {
        encode_base36(self.0, WIDTH)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for Position {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != WIDTH {
            return Err(CoreError::invalid_position(format!(
                "{s:?} is not {WIDTH} characters"
            )));
        }

        let mut value = 0u64;
        for c in s.bytes() {
            let digit = digit_value(c).ok_or_else(|| {
                CoreError::invalid_position(format!("{s:?} contains {:?}", c as char))
            })?;
            value = value * RADIX + digit;
        }
        Ok(Self(value))
    }
}

impl TryFrom<String> for Position {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Position> for String {
    fn from(value: Position) -> Self {
        value.key()
    }
}

fn digit_value(c: u8) -> Option<u64> {
    match c {
        b'0'..=b'9' => Some(u64::from(c - b'0')),
        b'A'..=b'Z' => Some(u64::from(c - b'A') + 10),
        b'a'..=b'z' => Some(u64::from(c - b'a') + 10),
        _ => None,
    }
}

/// Render `value` in base 36, left-padded with `0` to at least `width` chars.
pub(crate) fn encode_base36(mut value: u64, width: usize) -> String {
    let mut digits = Vec::with_capacity(width.max(13));
    while value > 0 {
        digits.push(ALPHABET[(value % RADIX) as usize]);
        value /= RADIX;
    }
    while digits.len() < width.max(1) {
        digits.push(b'0');
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn renders_fixed_width() {
        assert_eq!(Position::ZERO.to_string(), "000000");
        assert_eq!(Position::MAX.to_string(), "ZZZZZZ");
        assert_eq!(Position::new(35).unwrap().to_string(), "00000Z");
        assert_eq!(Position::new(36).unwrap().to_string(), "000010");
    }

    #[test]
    fn wraps_at_both_ends() {
        assert_eq!(Position::MAX.next(), Position::ZERO);
        assert_eq!(Position::ZERO.previous(), Position::MAX);

        let zero: Position = "000000".parse().unwrap();
        assert_eq!(zero.previous().to_string(), "ZZZZZZ");
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!("00000".parse::<Position>().is_err());
        assert!("0000000".parse::<Position>().is_err());
        assert!("00-000".parse::<Position>().is_err());
        assert_eq!("00000a".parse::<Position>().unwrap().value(), 10);
        assert!(Position::new(Position::CAPACITY).is_err());
    }

    #[test]
    fn distance_crosses_the_wrap() {
        let near_end = Position::MAX.retreat(2);
        let past_start = Position::ZERO.advance(3);
        assert_eq!(near_end.distance_to(past_start), 6);
        assert_eq!(past_start.distance_to(near_end), Position::CAPACITY - 6);
    }

    #[test]
    fn string_conversions_use_the_key_form() {
        let p = Position::new(1_295).unwrap();
        assert_eq!(String::from(p), "0000ZZ");
        assert_eq!(Position::try_from("0000ZZ".to_string()).unwrap(), p);
    }

    proptest! {
        #[test]
        fn next_and_previous_are_inverse(v in 0..Position::CAPACITY) {
            let p = Position::new(v).unwrap();
            prop_assert_eq!(p.previous().next(), p);
            prop_assert_eq!(p.next().previous(), p);
        }

        #[test]
        fn distance_to_next_is_one(v in 0..Position::CAPACITY) {
            let p = Position::new(v).unwrap();
            prop_assert_eq!(p.distance_to(p.next()), 1);
            prop_assert_eq!(p.distance_to(p), 0);
        }

        #[test]
        fn advance_matches_distance(v in 0..Position::CAPACITY, steps in 0..Position::CAPACITY) {
            let p = Position::new(v).unwrap();
            prop_assert_eq!(p.distance_to(p.advance(steps)), steps);
            prop_assert_eq!(p.advance(steps).retreat(steps), p);
        }

        #[test]
        fn key_round_trips(v in 0..Position::CAPACITY) {
            let p = Position::new(v).unwrap();
            let key = p.key();
            prop_assert_eq!(key.len(), WIDTH);
            prop_assert_eq!(key.parse::<Position>().unwrap(), p);
        }
    }
}
