use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Token counts for one request or an aggregate of many.
///
/// `total()` always includes all four token kinds, cache reads included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenCounts {
    /// Regular input tokens (not cached)
    pub input: u64,
    /// Generated output tokens
    pub output: u64,
    /// Tokens written to the prompt cache
    pub cache_write: u64,
    /// Tokens read from the prompt cache
    pub cache_read: u64,
}

impl TokenCounts {
    pub fn new(input: u64, output: u64, cache_write: u64, cache_read: u64) -> Self {
        Self {
            input,
            output,
            cache_write,
            cache_read,
        }
    }

    /// Additive identity
    pub const fn zero() -> Self {
        Self {
            input: 0,
            output: 0,
            cache_write: 0,
            cache_read: 0,
        }
    }

    /// Total tokens (input + output + cache write + cache read)
    ///
    /// Saturates at `u64::MAX`; a corrupt count never wraps or panics.
    pub fn total(&self) -> u64 {
        self.input
            .saturating_add(self.output)
            .saturating_add(self.cache_write)
            .saturating_add(self.cache_read)
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

impl Add for TokenCounts {
    type Output = TokenCounts;

    fn add(self, other: TokenCounts) -> TokenCounts {
        TokenCounts {
            input: self.input.saturating_add(other.input),
            output: self.output.saturating_add(other.output),
            cache_write: self.cache_write.saturating_add(other.cache_write),
            cache_read: self.cache_read.saturating_add(other.cache_read),
        }
    }
}

impl AddAssign for TokenCounts {
    fn add_assign(&mut self, other: TokenCounts) {
        *self = *self + other;
    }
}

impl Sum for TokenCounts {
    fn sum<I: Iterator<Item = TokenCounts>>(iter: I) -> Self {
        iter.fold(TokenCounts::zero(), Add::add)
    }
}

impl<'a> Sum<&'a TokenCounts> for TokenCounts {
    fn sum<I: Iterator<Item = &'a TokenCounts>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
