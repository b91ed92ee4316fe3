//! Evaluation-cycle counter.
//!
//! A model advances its epoch once per evaluation cycle. Each block stamps the
//! epoch at which it last computed its value; a value is current iff its stamp
//! equals the model's epoch. Keeping this a distinct type stops it from being
//! compared against port numbers, arena indices or other plain counters.

use core::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

impl Epoch {
    /// The epoch before any cycle has run.
    pub const ZERO: Epoch = Epoch(0);

    /// Move to the next cycle and return the new epoch.
    pub fn advance(&mut self) -> Epoch {
        self.0 += 1;
        *self
    }

    /// Number of cycles started so far.
    pub fn cycles(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_monotonic() {
        let mut e = Epoch::ZERO;
        let first = e.advance();
        let second = e.advance();
        assert!(first < second);
        assert_eq!(second.cycles(), 2);
        assert_eq!(e, second);
    }
}
