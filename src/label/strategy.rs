/// Byte OR-ed into every position by the case-insensitive strategies. Sets the ASCII
/// lowercase bit.
const CASE_BIT: u8 = 0x20;

/// Comparison and hashing rules for a [`KeyLabel`](super::KeyLabel).
///
/// Implementations must keep `equals` and `hash` consistent: two inputs that compare
/// equal hash equal.
pub trait LabelStrategy {
    /// Compare two slices of the same length.
    fn equals(a: &[u8], b: &[u8]) -> bool;

    fn hash(data: &[u8]) -> u32;
}

/// Exact byte comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exact {}

/// ASCII case-insensitive comparison. Non-letters compare exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseInsensitive {}

/// Case-insensitive comparison that ORs `0x20` into every byte before comparing.
///
/// # Precondition
///
/// Callers must only use it for tokens made of `[A-Za-z]` and `-`, such as header
/// names and values like `keep-alive`. Other bytes that differ only in bit `0x20`
/// (`@` and `` ` ``, `[` and `{`, ...) compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseInsensitiveFast {}

impl LabelStrategy for Exact {
    #[inline]
    fn equals(a: &[u8], b: &[u8]) -> bool {
        a == b
    }

    #[inline]
    fn hash(data: &[u8]) -> u32 {
        fold_hash(data, 0)
    }
}

impl LabelStrategy for CaseInsensitive {
    #[inline]
    fn equals(a: &[u8], b: &[u8]) -> bool {
        equals_ci(a, b)
    }

    #[inline]
    fn hash(data: &[u8]) -> u32 {
        fold_hash(data, CASE_BIT)
    }
}

impl LabelStrategy for CaseInsensitiveFast {
    #[inline]
    fn equals(a: &[u8], b: &[u8]) -> bool {
        equals_ci_fast(a, b)
    }

    #[inline]
    fn hash(data: &[u8]) -> u32 {
        fold_hash(data, CASE_BIT)
    }
}

#[inline]
pub fn equals_ci(a: &[u8], b: &[u8]) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// See [`CaseInsensitiveFast`] for the precondition on the compared bytes.
#[inline]
pub fn equals_ci_fast(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x | CASE_BIT == y | CASE_BIT)
}

/// XOR-fold `data` into a 32-bit accumulator, four native-order bytes at a time.
///
/// Every byte is OR-ed with `mask` first. The trailing 0..=3 bytes are folded into
/// the accumulator's leading byte positions.
pub fn fold_hash(data: &[u8], mask: u8) -> u32 {
    let word_mask = u32::from_ne_bytes([mask; 4]);
    let mut chunks = data.chunks_exact(4);
    let mut result = 0u32;
    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        result ^= word | word_mask;
    }

    let mut bytes = result.to_ne_bytes();
    for (slot, byte) in bytes.iter_mut().zip(chunks.remainder()) {
        *slot ^= byte | mask;
    }
    u32::from_ne_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_hash_words_and_tail() {
        assert_eq!(fold_hash(b"", 0), 0);
        let word = u32::from_ne_bytes(*b"abcd");
        assert_eq!(fold_hash(b"abcd", 0), word);
        assert_eq!(fold_hash(b"abcdabcd", 0), 0);

        let tail = u32::from_ne_bytes([b'x', b'y', 0, 0]);
        assert_eq!(fold_hash(b"abcdxy", 0), word ^ tail);
    }

    #[test]
    fn fold_hash_mask_lowercases_letters() {
        assert_eq!(fold_hash(b"KEEP-ALIVE", CASE_BIT), fold_hash(b"keep-alive", 0));
        assert_ne!(fold_hash(b"KEEP-ALIVE", 0), fold_hash(b"keep-alive", 0));
    }

    #[test]
    fn ci_equality_agrees_with_hash() {
        let inputs: &[&[u8]] = &[
            b"Connection",
            b"CONNECTION",
            b"connection",
            b"Upgrade",
            b"UPGRADE",
            b"x-Request-Id",
            b"X-REQUEST-ID",
            b"a",
            b"A",
        ];
        for a in inputs {
            for b in inputs {
                if a.len() == b.len() && CaseInsensitive::equals(a, b) {
                    assert_eq!(CaseInsensitive::hash(a), CaseInsensitive::hash(b));
                }
                if a.len() == b.len() && CaseInsensitiveFast::equals(a, b) {
                    assert_eq!(CaseInsensitiveFast::hash(a), CaseInsensitiveFast::hash(b));
                }
                if Exact::equals(a, b) {
                    assert_eq!(Exact::hash(a), Exact::hash(b));
                }
            }
        }
    }

    #[test]
    fn ci_fast_equality() {
        assert!(equals_ci_fast(b"Keep-Alive", b"keep-alive"));
        assert!(!equals_ci_fast(b"keep-alive", b"keep-alivf"));
        assert!(!equals_ci_fast(b"close", b"closed"));
        assert!(equals_ci(b"HTTP/1.1", b"http/1.1"));
    }
}
