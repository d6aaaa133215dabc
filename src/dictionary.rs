use alloc::vec::Vec;

use crate::fastr::{FaStr, LenHash, TmpFaStr};
use crate::word::Word;

#[derive(Debug, PartialEq)]
pub enum MemError {
    OutOfMemory,
    BadAddress,
}

// Cell offsets of the header fields, relative to the header address.
// A word's code field sits at a fixed offset past its header.
const OFF_LINK: usize = 0;
const OFF_NAME: usize = 1;
const OFF_HASH: usize = 2;
const OFF_CFA: usize = 3;

// Link cell payload marking the end of the chain.
const NO_LINK: i32 = -1;

/// The unified memory of one VM instance: a single growable cell arena
/// holding word headers, code fields, threaded bodies, and data, plus the
/// `tail` pointer rooting the newest-first header chain.
///
/// Everything is addressed by index, so addresses stay stable as the arena
/// grows, and patching a compiled branch offset is a plain `store`.
///
/// Header layout:
///
/// * `+0` link: `Int` address of the previous header, `-1` for none
/// * `+1` name: `Str`, folded to lowercase
/// * `+2` hash: `Int` packed [`LenHash`] (bit 29 carries the immediate flag)
/// * `+3` code field: `Xt` index of a native behavior
pub struct Dictionary {
    cells: Vec<Word>,
    max_cells: usize,
    pub(crate) tail: Option<usize>,
}

impl Dictionary {
    pub fn new(max_cells: usize) -> Self {
        Self {
            cells: Vec::new(),
            max_cells,
            tail: None,
        }
    }

    /// The append cursor: one past the last occupied cell.
    #[inline]
    pub fn here(&self) -> usize {
        self.cells.len()
    }

    pub fn used(&self) -> usize {
        self.cells.len()
    }

    pub fn capacity(&self) -> usize {
        self.max_cells
    }

    #[inline]
    pub fn load(&self, addr: usize) -> Result<&Word, MemError> {
        self.cells.get(addr).ok_or(MemError::BadAddress)
    }

    #[inline]
    pub fn store(&mut self, addr: usize, word: Word) -> Result<(), MemError> {
        match self.cells.get_mut(addr) {
            Some(cell) => {
                *cell = word;
                Ok(())
            }
            None => Err(MemError::BadAddress),
        }
    }

    /// Write one cell at `here`, growing the arena. Returns the address
    /// written.
    pub fn append(&mut self, word: Word) -> Result<usize, MemError> {
        if self.cells.len() >= self.max_cells {
            return Err(MemError::OutOfMemory);
        }
        let addr = self.cells.len();
        self.cells.push(word);
        Ok(addr)
    }

    /// Grow by `delta` zero cells, or truncate the topmost `-delta` cells.
    /// Truncating below live data is the caller's lookout; it is not
    /// validated here.
    pub fn resize(&mut self, delta: i32) -> Result<(), MemError> {
        if delta >= 0 {
            let grown = self.cells.len() + delta as usize;
            if grown > self.max_cells {
                return Err(MemError::OutOfMemory);
            }
            self.cells.resize(grown, Word::Int(0));
        } else {
            let shrunk = self.cells.len().saturating_sub(delta.unsigned_abs() as usize);
            self.cells.truncate(shrunk);
        }
        Ok(())
    }

    /// Write a header at `here` WITHOUT linking it into the chain. The
    /// entry stays unreachable by name until [`Dictionary::link`] runs, so
    /// a failed definition never publishes a half-built header.
    pub(crate) fn allocate_header(
        &mut self,
        name: &FaStr,
        immediate: bool,
    ) -> Result<usize, MemError> {
        let hdr = self.append(Word::Int(NO_LINK))?;
        self.append(Word::Str(name.share()))?;
        let mut raw = name.raw();
        if immediate {
            raw |= LenHash::IMMEDIATE;
        }
        self.append(Word::Int(raw as i32))?;
        Ok(hdr)
    }

    /// Publish a header: point its link cell at the current tail and make
    /// it the new tail. Newest-first, so this also shadows any older entry
    /// with the same name.
    pub(crate) fn link(&mut self, hdr: usize) -> Result<(), MemError> {
        let prev = match self.tail {
            Some(t) => t as i32,
            None => NO_LINK,
        };
        self.store(hdr + OFF_LINK, Word::Int(prev))?;
        self.tail = Some(hdr);
        Ok(())
    }

    /// Walk the chain newest-first and return the first header whose name
    /// matches, case-insensitively. Pure read-only traversal.
    pub fn find(&self, name: &TmpFaStr<'_>) -> Option<usize> {
        let mut cur = self.tail;
        while let Some(hdr) = cur {
            let raw = match self.load(hdr + OFF_HASH) {
                Ok(Word::Int(raw)) => *raw as u32,
                _ => return None,
            };
            if name.matches_raw(raw) {
                if let Ok(Word::Str(stored)) = self.load(hdr + OFF_NAME) {
                    if stored.eq_ignore_ascii_case(name.as_str()) {
                        return Some(hdr);
                    }
                }
            }
            cur = match self.load(hdr + OFF_LINK) {
                Ok(Word::Int(link)) if *link >= 0 => Some(*link as usize),
                _ => None,
            };
        }
        None
    }

    /// Header address to code field address: a fixed offset.
    #[inline]
    pub(crate) const fn entry_cfa(hdr: usize) -> usize {
        hdr + OFF_CFA
    }

    pub(crate) fn entry_immediate(&self, hdr: usize) -> Result<bool, MemError> {
        match self.load(hdr + OFF_HASH)? {
            Word::Int(raw) => Ok(LenHash::from_raw(*raw as u32).bits() & 0b001 != 0),
            _ => Err(MemError::BadAddress),
        }
    }

    pub(crate) fn set_immediate(&mut self, hdr: usize) -> Result<(), MemError> {
        let raw = match self.load(hdr + OFF_HASH)? {
            Word::Int(raw) => *raw as u32,
            _ => return Err(MemError::BadAddress),
        };
        self.store(hdr + OFF_HASH, Word::Int((raw | LenHash::IMMEDIATE) as i32))
    }
}

#[cfg(test)]
pub mod test {
    use super::{Dictionary, MemError};
    use crate::fastr::{FaStr, TmpFaStr};
    use crate::word::Word;

    fn seed(dict: &mut Dictionary, name: &str) -> usize {
        let name = FaStr::new_from(name);
        let hdr = dict.allocate_header(&name, false).unwrap();
        dict.append(Word::Xt(0)).unwrap();
        dict.link(hdr).unwrap();
        hdr
    }

    #[test]
    fn find_is_case_insensitive_and_newest_first() {
        let mut dict = Dictionary::new(128);
        let first = seed(&mut dict, "dup");
        let other = seed(&mut dict, "swap");

        assert_eq!(dict.find(&TmpFaStr::new_from("DUP")), Some(first));
        assert_eq!(dict.find(&TmpFaStr::new_from("Swap")), Some(other));
        assert_eq!(dict.find(&TmpFaStr::new_from("rot")), None);

        // A redefinition shadows the old entry without removing it
        let second = seed(&mut dict, "dup");
        assert_ne!(first, second);
        assert_eq!(dict.find(&TmpFaStr::new_from("dup")), Some(second));
        assert!(dict.load(super::Dictionary::entry_cfa(first)).is_ok());
    }

    #[test]
    fn unlinked_headers_are_invisible() {
        let mut dict = Dictionary::new(128);
        let name = FaStr::new_from("ghost");
        let hdr = dict.allocate_header(&name, false).unwrap();
        assert_eq!(dict.find(&TmpFaStr::new_from("ghost")), None);
        dict.link(hdr).unwrap();
        assert_eq!(dict.find(&TmpFaStr::new_from("ghost")), Some(hdr));
    }

    #[test]
    fn immediate_flag_round_trip() {
        let mut dict = Dictionary::new(128);
        let hdr = seed(&mut dict, "then");
        assert!(!dict.entry_immediate(hdr).unwrap());
        dict.set_immediate(hdr).unwrap();
        assert!(dict.entry_immediate(hdr).unwrap());
        // The flag does not perturb lookup
        assert_eq!(dict.find(&TmpFaStr::new_from("then")), Some(hdr));
    }

    #[test]
    fn resize_grows_zero_filled_and_truncates() {
        let mut dict = Dictionary::new(16);
        let base = dict.here();
        dict.resize(4).unwrap();
        assert_eq!(dict.here(), base + 4);
        assert_eq!(dict.load(base + 3), Ok(&Word::Int(0)));
        dict.resize(-4).unwrap();
        assert_eq!(dict.here(), base);
        assert_eq!(dict.load(base), Err(MemError::BadAddress));
    }

    #[test]
    fn append_respects_the_cell_budget() {
        let mut dict = Dictionary::new(2);
        dict.append(Word::Int(1)).unwrap();
        dict.append(Word::Int(2)).unwrap();
        assert_eq!(dict.append(Word::Int(3)), Err(MemError::OutOfMemory));
        assert_eq!(dict.resize(1), Err(MemError::OutOfMemory));
    }
}
