use alloc::rc::Rc;
use alloc::string::String;
use core::hash::Hasher as _;
use hash32::{FnvHasher, Hasher};

/// A borrowed lookup key: the hash of a token, computed without allocating.
///
/// `find` must stay a pure read-only traversal, so the lookup side never
/// case-folds into a fresh buffer; the hash is folded byte by byte and the
/// final comparison is `eq_ignore_ascii_case` against the stored name.
pub struct TmpFaStr<'a> {
    stir: &'a str,
    len_hash: LenHash,
}

impl<'a> TmpFaStr<'a> {
    pub fn new_from(stir: &'a str) -> Self {
        Self {
            len_hash: LenHash::from_str(stir),
            stir,
        }
    }

    pub fn as_str(&self) -> &str {
        self.stir
    }

    /// Does a stored raw hash word match this key, ignoring the flag bits?
    pub fn matches_raw(&self, raw: u32) -> bool {
        LenHash::from_raw(raw).eq_ignore_bits(&self.len_hash)
    }
}

/// An owned dictionary name: case-folded to lowercase once, at definition
/// time, with its [`LenHash`] cached alongside.
pub struct FaStr {
    stir: Rc<str>,
    len_hash: LenHash,
}

impl FaStr {
    pub fn new_from(stir: &str) -> Self {
        let folded: String = stir.chars().map(|c| c.to_ascii_lowercase()).collect();
        Self {
            len_hash: LenHash::from_str(&folded),
            stir: Rc::from(folded.as_str()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.stir
    }

    /// The packed hash word, as stored in a header's hash cell.
    pub fn raw(&self) -> u32 {
        self.len_hash.inner
    }

    /// Share the folded name text (for the header's name cell).
    pub(crate) fn share(&self) -> Rc<str> {
        self.stir.clone()
    }
}

impl PartialEq<TmpFaStr<'_>> for FaStr {
    fn eq(&self, other: &TmpFaStr<'_>) -> bool {
        // First, check the hash. A match can still be a collision, so the
        // string comparison has the final say.
        self.len_hash.eq_ignore_bits(&other.len_hash)
            && self.stir.eq_ignore_ascii_case(other.stir)
    }
}

#[derive(Copy, Clone)]
pub struct LenHash {
    // 29..32: 3-bit bitfield (bit 29: immediate flag)
    // 24..29: 5-bit len (0..31)
    // 00..24: 24-bit FnvHash
    inner: u32,
}

impl LenHash {
    const HASH_MASK: u32 = 0x00FF_FFFF;
    const BITS_MASK: u32 = 0xE000_0000;
    const LEN_MASK: u32 = 0x1F00_0000;

    /// Flag bit marking an immediate word, in header hash cells.
    pub const IMMEDIATE: u32 = 1 << 29;

    /// Creates a new LenHash, considering UP TO 31 ascii characters.
    ///
    /// Hashing folds each byte to lowercase, so `From` and `from` land on
    /// the same hash; names longer than 31 bytes are disambiguated by the
    /// full string comparison that follows a hash match.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        let mut hasher = FnvHasher::default();
        let len = s.len().min(31);
        for b in s.as_bytes()[..len].iter() {
            hasher.write(&[b.to_ascii_lowercase()]);
        }
        let hash = hasher.finish32();
        let inner = ((len as u32) << 24) | (hash & Self::HASH_MASK);
        Self { inner }
    }

    pub fn from_raw(inner: u32) -> Self {
        Self { inner }
    }

    pub fn raw(&self) -> u32 {
        self.inner
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        let len_u32 = (self.inner & Self::LEN_MASK) >> 24;
        len_u32 as usize
    }

    pub fn bits(&self) -> u8 {
        let bits_u32 = (self.inner & Self::BITS_MASK) >> 29;
        bits_u32 as u8
    }

    pub fn eq_ignore_bits(&self, other: &Self) -> bool {
        (self.inner & !Self::BITS_MASK) == (other.inner & !Self::BITS_MASK)
    }
}

#[cfg(test)]
pub mod test {
    use super::{FaStr, LenHash, TmpFaStr};

    #[test]
    fn fold_and_match() {
        let defined = FaStr::new_from("DOUBLE");
        assert_eq!(defined.as_str(), "double");

        for query in ["double", "DOUBLE", "Double", "dOuBlE"] {
            let tafs = TmpFaStr::new_from(query);
            assert!(defined == tafs);
            assert!(tafs.matches_raw(defined.raw()));
        }

        let other = TmpFaStr::new_from("triple");
        assert!(!(defined == other));
    }

    #[test]
    fn long_names_compare_past_the_hash() {
        let a = FaStr::new_from("a-rather-long-word-name-over-31-chars-x");
        let b = TmpFaStr::new_from("a-rather-long-word-name-over-31-chars-x");
        let c = TmpFaStr::new_from("a-rather-long-word-name-over-31-chars-y");
        assert!(a == b);
        assert!(!(a == c));
    }

    #[test]
    fn immediate_bit_is_ignored_by_eq() {
        let lh = LenHash::from_str("if");
        let flagged = LenHash::from_raw(lh.raw() | LenHash::IMMEDIATE);
        assert!(lh.eq_ignore_bits(&flagged));
        assert_eq!(flagged.bits() & 0b001, 1);
        assert_eq!(lh.bits(), 0);
        assert_eq!(lh.len(), 2);
    }
}
