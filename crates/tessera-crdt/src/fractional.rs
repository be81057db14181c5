//! Fractional position keys.
//!
//! Keys are variable-length strings whose byte order is the scene order. A key
//! is an *integer part* followed by an optional *fraction*:
//!
//! ```text
//!   a0      integer "a0", no fraction
//!   a0V     integer "a0", fraction "V"
//!   Zz      integer "Zz" (negative side, sorts before every "a…" key)
//! ```
//!
//! The head character fixes the integer part's length: `a`..`z` give lengths
//! 2..27 for non-negative integers, `Z`..`A` give 2..27 for negative ones. The
//! remaining characters are digits from the charset. A fraction never ends in
//! the zero digit (that would alias a shorter key), and `A` followed by 26
//! zero digits is reserved as the unreachable bottom of the space.
//!
//! Generating between any two distinct keys always succeeds unless the
//! integer space is exhausted at the edges, so insertion density is
//! unbounded. Jitter appends random fraction digits to cut the odds that two
//! peers inserting at the same spot mint the same key; the repair pass in
//! [`crate::indices`] resolves whatever collisions remain.

use rand::Rng;
use tracing::debug;

use crate::config::{Charset, IndexConfig};
use crate::{CrdtError, Result};

/// Number of random digits appended by jitter unless configured otherwise.
pub const DEFAULT_JITTER_DIGITS: usize = 6;

/// Ordered digit alphabet for position keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexCharSet {
    digits: &'static [u8],
}

/// Base-62 digits (0-9, A-Z, a-z). Lexicographically ordered: '0' < '9' < 'A' < 'Z' < 'a' < 'z'.
pub const BASE62: IndexCharSet = IndexCharSet {
    digits: b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz",
};

/// Base-36 digits (0-9, A-Z). Shorter, easier to read keys for debugging.
pub const BASE36: IndexCharSet = IndexCharSet {
    digits: b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ",
};

/// Integer-part length for a head character.
fn integer_length(head: u8) -> Option<usize> {
    match head {
        b'a'..=b'z' => Some((head - b'a') as usize + 2),
        b'A'..=b'Z' => Some((b'Z' - head) as usize + 2),
        _ => None,
    }
}

fn push_bytes(head: u8, digits: &[u8]) -> String {
    let mut out = String::with_capacity(digits.len() + 1);
    out.push(head as char);
    out.extend(digits.iter().map(|&d| d as char));
    out
}

impl IndexCharSet {
    pub fn digits(&self) -> &'static [u8] {
        self.digits
    }

    fn base(&self) -> usize {
        self.digits.len()
    }

    fn zero(&self) -> u8 {
        self.digits[0]
    }

    fn last(&self) -> u8 {
        self.digits[self.digits.len() - 1]
    }

    fn digit(&self, c: u8) -> Option<usize> {
        self.digits.iter().position(|&d| d == c)
    }

    fn digit_of(&self, key: &str, c: u8) -> Result<usize> {
        self.digit(c)
            .ok_or_else(|| CrdtError::invalid_key(key, "character outside charset"))
    }

    /// The reserved bottom integer: `A` followed by 26 zero digits.
    fn smallest_integer(&self) -> String {
        let mut s = String::with_capacity(27);
        s.push('A');
        s.extend(std::iter::repeat_n(self.zero() as char, 26));
        s
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Check that `key` follows the key format for this charset.
    pub fn validate_key(&self, key: &str) -> Result<()> {
        if !key.is_ascii() {
            return Err(CrdtError::invalid_key(key, "non-ascii character"));
        }
        if key == self.smallest_integer() {
            return Err(CrdtError::invalid_key(key, "reserved smallest key"));
        }
        let int = self.integer_part(key)?;
        for &c in &key.as_bytes()[1..] {
            self.digit_of(key, c)?;
        }
        if key.len() > int.len() && key.as_bytes().last() == Some(&self.zero()) {
            return Err(CrdtError::invalid_key(key, "fraction has trailing zero"));
        }
        Ok(())
    }

    /// Whether `key` follows the key format for this charset.
    pub fn is_valid_key(&self, key: &str) -> bool {
        self.validate_key(key).is_ok()
    }

    fn integer_part<'k>(&self, key: &'k str) -> Result<&'k str> {
        let head = *key
            .as_bytes()
            .first()
            .ok_or_else(|| CrdtError::invalid_key(key, "empty key"))?;
        let len = integer_length(head)
            .ok_or_else(|| CrdtError::invalid_key(key, "head must be a-z or A-Z"))?;
        if len > key.len() || !key.is_char_boundary(len) {
            return Err(CrdtError::invalid_key(key, "integer part too short"));
        }
        Ok(&key[..len])
    }

    fn validate_integer(&self, int: &str) -> Result<()> {
        let head = int.as_bytes().first().copied().unwrap_or(0);
        if integer_length(head) != Some(int.len()) {
            return Err(CrdtError::invalid_key(int, "integer part has wrong length"));
        }
        Ok(())
    }

    // =========================================================================
    // Integer arithmetic
    // =========================================================================

    /// Next integer, or `None` past the largest representable one.
    fn increment_integer(&self, int: &str) -> Result<Option<String>> {
        self.validate_integer(int)?;
        let bytes = int.as_bytes();
        let head = bytes[0];
        let mut digs = bytes[1..].to_vec();

        let mut carry = true;
        for slot in digs.iter_mut().rev() {
            let d = self.digit_of(int, *slot)? + 1;
            if d == self.base() {
                *slot = self.zero();
            } else {
                *slot = self.digits[d];
                carry = false;
                break;
            }
        }

        if !carry {
            return Ok(Some(push_bytes(head, &digs)));
        }
        match head {
            b'Z' => Ok(Some(push_bytes(b'a', &[self.zero()]))),
            b'z' => Ok(None),
            _ => {
                let h = head + 1;
                if h > b'a' {
                    digs.push(self.zero());
                } else {
                    digs.pop();
                }
                Ok(Some(push_bytes(h, &digs)))
            }
        }
    }

    /// Previous integer, or `None` below the smallest representable one.
    fn decrement_integer(&self, int: &str) -> Result<Option<String>> {
        self.validate_integer(int)?;
        let bytes = int.as_bytes();
        let head = bytes[0];
        let mut digs = bytes[1..].to_vec();

        let mut borrow = true;
        for slot in digs.iter_mut().rev() {
            let d = self.digit_of(int, *slot)?;
            if d == 0 {
                *slot = self.last();
            } else {
                *slot = self.digits[d - 1];
                borrow = false;
                break;
            }
        }

        if !borrow {
            return Ok(Some(push_bytes(head, &digs)));
        }
        match head {
            b'a' => Ok(Some(push_bytes(b'Z', &[self.last()]))),
            b'A' => Ok(None),
            _ => {
                let h = head - 1;
                if h < b'Z' {
                    digs.push(self.last());
                } else {
                    digs.pop();
                }
                Ok(Some(push_bytes(h, &digs)))
            }
        }
    }

    // =========================================================================
    // Fraction midpoint
    // =========================================================================

    /// A fraction strictly between `a` and `b` (`None` = open above).
    ///
    /// Both inputs are digit strings without trailing zeros and `a < b`.
    fn midpoint(&self, a: &str, b: Option<&str>) -> Result<String> {
        let zero = self.zero();
        if let Some(b) = b
            && a >= b
        {
            return Err(CrdtError::exhausted(Some(a), Some(b)));
        }
        if a.as_bytes().last() == Some(&zero) {
            return Err(CrdtError::invalid_key(a, "fraction has trailing zero"));
        }
        if let Some(b) = b
            && b.as_bytes().last() == Some(&zero)
        {
            return Err(CrdtError::invalid_key(b, "fraction has trailing zero"));
        }

        if let Some(b) = b {
            // Strip the common prefix, treating a missing digit of `a` as zero.
            let (ab, bb) = (a.as_bytes(), b.as_bytes());
            let mut n = 0;
            while n < bb.len() && ab.get(n).copied().unwrap_or(zero) == bb[n] {
                n += 1;
            }
            if n > 0 {
                if n == bb.len() {
                    return Err(CrdtError::exhausted(Some(a), Some(b)));
                }
                let rest = self.midpoint(&a[n.min(a.len())..], Some(&b[n..]))?;
                return Ok(format!("{}{}", &b[..n], rest));
            }
        }

        // First digits (or lack of digit) now differ.
        let digit_a = match a.as_bytes().first() {
            Some(&c) => self.digit_of(a, c)?,
            None => 0,
        };
        let digit_b = match b {
            Some(b) => self.digit_of(b, b.as_bytes()[0])?,
            None => self.base(),
        };

        if digit_b > digit_a + 1 {
            // Round half up
            let mid = (digit_a + digit_b + 1) / 2;
            return Ok((self.digits[mid] as char).to_string());
        }

        // Consecutive first digits.
        if let Some(b) = b
            && b.len() > 1
        {
            return Ok(b[..1].to_string());
        }
        let tail = if a.is_empty() { "" } else { &a[1..] };
        Ok(format!(
            "{}{}",
            self.digits[digit_a] as char,
            self.midpoint(tail, None)?
        ))
    }

    // =========================================================================
    // Key generation
    // =========================================================================

    /// A key strictly between `lower` and `upper`. A missing bound is open.
    pub fn key_between(&self, lower: Option<&str>, upper: Option<&str>) -> Result<String> {
        if let Some(a) = lower {
            self.validate_key(a)?;
        }
        if let Some(b) = upper {
            self.validate_key(b)?;
        }
        if let (Some(a), Some(b)) = (lower, upper)
            && a >= b
        {
            return Err(CrdtError::exhausted(lower, upper));
        }

        match (lower, upper) {
            (None, None) => Ok(push_bytes(b'a', &[self.zero()])),
            (None, Some(b)) => {
                let ib = self.integer_part(b)?;
                let fb = &b[ib.len()..];
                if ib == self.smallest_integer() {
                    return Ok(format!("{ib}{}", self.midpoint("", Some(fb))?));
                }
                if ib.len() < b.len() {
                    return Ok(ib.to_string());
                }
                self.decrement_integer(ib)?
                    .ok_or_else(|| CrdtError::exhausted(lower, upper))
            }
            (Some(a), None) => {
                let ia = self.integer_part(a)?;
                let fa = &a[ia.len()..];
                match self.increment_integer(ia)? {
                    Some(next) => Ok(next),
                    None => Ok(format!("{ia}{}", self.midpoint(fa, None)?)),
                }
            }
            (Some(a), Some(b)) => {
                let ia = self.integer_part(a)?;
                let fa = &a[ia.len()..];
                let ib = self.integer_part(b)?;
                let fb = &b[ib.len()..];
                if ia == ib {
                    return Ok(format!("{ia}{}", self.midpoint(fa, Some(fb))?));
                }
                let next = self
                    .increment_integer(ia)?
                    .ok_or_else(|| CrdtError::exhausted(lower, upper))?;
                if next.as_str() < b {
                    Ok(next)
                } else {
                    Ok(format!("{ia}{}", self.midpoint(fa, None)?))
                }
            }
        }
    }

    /// `n` increasing keys strictly between `lower` and `upper`.
    ///
    /// With both bounds present the range is bisected recursively, so key
    /// length grows logarithmically in `n` rather than linearly.
    pub fn n_keys_between(
        &self,
        lower: Option<&str>,
        upper: Option<&str>,
        n: usize,
    ) -> Result<Vec<String>> {
        match n {
            0 => return Ok(Vec::new()),
            1 => return Ok(vec![self.key_between(lower, upper)?]),
            _ => {}
        }

        match (lower, upper) {
            (_, None) => {
                let mut keys = Vec::with_capacity(n);
                let mut current = self.key_between(lower, None)?;
                for _ in 1..n {
                    let next = self.key_between(Some(&current), None)?;
                    keys.push(std::mem::replace(&mut current, next));
                }
                keys.push(current);
                Ok(keys)
            }
            (None, Some(_)) => {
                let mut keys = Vec::with_capacity(n);
                let mut current = self.key_between(None, upper)?;
                for _ in 1..n {
                    let prev = self.key_between(None, Some(&current))?;
                    keys.push(std::mem::replace(&mut current, prev));
                }
                keys.push(current);
                keys.reverse();
                Ok(keys)
            }
            (Some(_), Some(_)) => {
                let half = n / 2;
                let mid = self.key_between(lower, upper)?;
                let mut keys = self.n_keys_between(lower, Some(&mid), half)?;
                let above = self.n_keys_between(Some(&mid), upper, n - half - 1)?;
                keys.push(mid);
                keys.extend(above);
                Ok(keys)
            }
        }
    }

    // =========================================================================
    // Jitter
    // =========================================================================

    /// Append `digits` random fraction digits to `key`, keeping it below
    /// `upper`. The last digit is never zero, so the result stays well-formed.
    /// Falls back to the plain key when the jittered one would reach `upper`.
    fn jitter<R: Rng + ?Sized>(
        &self,
        key: String,
        upper: Option<&str>,
        digits: usize,
        rng: &mut R,
    ) -> String {
        if digits == 0 {
            return key;
        }
        let mut candidate = key.clone();
        for i in 0..digits {
            let d = if i + 1 == digits {
                rng.gen_range(1..self.base())
            } else {
                rng.gen_range(0..self.base())
            };
            candidate.push(self.digits[d] as char);
        }
        match upper {
            Some(u) if candidate.as_str() >= u => key,
            _ => candidate,
        }
    }

    /// Like [`key_between`](Self::key_between) with `digits` of random jitter.
    pub fn jittered_key_between<R: Rng + ?Sized>(
        &self,
        lower: Option<&str>,
        upper: Option<&str>,
        digits: usize,
        rng: &mut R,
    ) -> Result<String> {
        let key = self.key_between(lower, upper)?;
        Ok(self.jitter(key, upper, digits, rng))
    }

    /// Like [`n_keys_between`](Self::n_keys_between), each key jittered
    /// below its un-jittered successor.
    pub fn n_jittered_keys_between<R: Rng + ?Sized>(
        &self,
        lower: Option<&str>,
        upper: Option<&str>,
        n: usize,
        digits: usize,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        let keys = self.n_keys_between(lower, upper, n)?;
        let mut jittered = Vec::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            let bound = keys.get(i + 1).map(String::as_str).or(upper);
            jittered.push(self.jitter(key.clone(), bound, digits, rng));
        }
        Ok(jittered)
    }
}

// =========================================================================
// Configured generator
// =========================================================================

/// Key generation as configured for a scene: charset plus optional jitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyGenerator {
    charset: IndexCharSet,
    /// `None` disables jitter.
    jitter_digits: Option<usize>,
}

impl KeyGenerator {
    pub fn new(config: &IndexConfig) -> Self {
        let charset = match config.charset {
            Charset::Base62 => BASE62,
            Charset::Base36 => BASE36,
        };
        Self {
            charset,
            jitter_digits: config.jitter.then_some(config.jitter_digits),
        }
    }

    /// Unjittered generation: identical inputs give identical keys.
    pub fn deterministic(charset: IndexCharSet) -> Self {
        Self {
            charset,
            jitter_digits: None,
        }
    }

    pub fn charset(&self) -> IndexCharSet {
        self.charset
    }

    pub fn is_jittered(&self) -> bool {
        self.jitter_digits.is_some()
    }

    pub fn key_between(&self, lower: Option<&str>, upper: Option<&str>) -> Result<String> {
        let key = match self.jitter_digits {
            Some(digits) => {
                self.charset
                    .jittered_key_between(lower, upper, digits, &mut rand::thread_rng())
            }
            None => self.charset.key_between(lower, upper),
        };
        key.inspect_err(|err| debug!(%err, ?lower, ?upper, "no position key between bounds"))
    }

    pub fn n_keys_between(
        &self,
        lower: Option<&str>,
        upper: Option<&str>,
        n: usize,
    ) -> Result<Vec<String>> {
        let keys = match self.jitter_digits {
            Some(digits) => self.charset.n_jittered_keys_between(
                lower,
                upper,
                n,
                digits,
                &mut rand::thread_rng(),
            ),
            None => self.charset.n_keys_between(lower, upper, n),
        };
        keys.inspect_err(|err| debug!(%err, ?lower, ?upper, n, "no position keys between bounds"))
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new(&IndexConfig::default())
    }
}

/// Base-62 key strictly between `lower` and `upper`.
pub fn key_between(lower: Option<&str>, upper: Option<&str>) -> Result<String> {
    BASE62.key_between(lower, upper)
}

/// Base-62 key strictly between `lower` and `upper`, with default jitter.
pub fn jittered_key_between(lower: Option<&str>, upper: Option<&str>) -> Result<String> {
    BASE62.jittered_key_between(lower, upper, DEFAULT_JITTER_DIGITS, &mut rand::thread_rng())
}

/// `n` increasing base-62 keys strictly between `lower` and `upper`.
pub fn n_keys_between(lower: Option<&str>, upper: Option<&str>, n: usize) -> Result<Vec<String>> {
    BASE62.n_keys_between(lower, upper, n)
}

// =========================================================================
// Tests
// =========================================================================
