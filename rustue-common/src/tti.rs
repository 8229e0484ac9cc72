//! TTI (transmission time interval) counter
//!
//! The radio timing source numbers every interval it signals to the stack.
//! All tick-dependent layer logic keys off this counter.

use serde::{Deserialize, Serialize};

/// TTI counter handed to the stack by the radio timing source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tti(u32);

impl Tti {
    /// Creates a TTI from a raw counter value.
    pub fn new(tti: u32) -> Self {
        Self(tti)
    }

    /// Returns the raw counter value.
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Returns the following TTI.
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Advances this TTI in place.
    pub fn advance(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

impl std::fmt::Display for Tti {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tti={}", self.0)
    }
}

impl From<u32> for Tti {
    fn from(tti: u32) -> Self {
        Self(tti)
    }
}

impl From<Tti> for u32 {
    fn from(tti: Tti) -> u32 {
        tti.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tti_value() {
        let tti = Tti::new(42);
        assert_eq!(tti.value(), 42);
        assert_eq!(format!("{tti}"), "tti=42");
    }

    #[test]
    fn test_tti_next() {
        let tti = Tti::new(7);
        assert_eq!(tti.next().value(), 8);
        assert_eq!(tti.value(), 7);
    }

    #[test]
    fn test_tti_advance_wraps() {
        let mut tti = Tti::new(u32::MAX);
        tti.advance();
        assert_eq!(tti.value(), 0);
    }

    #[test]
    fn test_tti_from_u32() {
        let tti: Tti = 100.into();
        assert_eq!(tti.value(), 100);
        let raw: u32 = tti.into();
        assert_eq!(raw, 100);
    }
}
