use alloc::string::String;

/// One buffered line of source text, consumed token by token.
///
/// The buffer keeps its original case; names are folded at definition and
/// lookup time instead, so quoted string literals pass through verbatim.
pub struct WordStrBuf {
    buf: String,
    cur: usize,
    holding: Holding,
}

enum Holding {
    None,
    Word((usize, usize)),
    Str((usize, usize)),
}

impl WordStrBuf {
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            cur: 0,
            holding: Holding::None,
        }
    }

    pub fn fill(&mut self, input: &str) -> Result<(), ()> {
        if !input.is_ascii() {
            return Err(());
        }
        self.buf.clear();
        self.buf.push_str(input);
        self.cur = 0;
        self.holding = Holding::None;
        Ok(())
    }

    // Move `self.cur` to the next non-whitespace character, and return its
    // index. Returns `None` if we hit the end.
    fn next_nonwhitespace(&mut self) -> Option<usize> {
        let bytes = self.buf.as_bytes();
        loop {
            if self.cur >= bytes.len() {
                return None;
            }
            if !bytes[self.cur].is_ascii_whitespace() {
                return Some(self.cur);
            }
            self.cur += 1;
        }
    }

    pub fn advance(&mut self) {
        self.holding = Holding::None;

        // Find the start, skipping any ASCII whitespace
        let start = match self.next_nonwhitespace() {
            Some(s) => s,
            None => return,
        };
        // Find the end, either the first ASCII whitespace, or the end of
        // the buffer. This is ONE PAST the last character.
        let bytes = self.buf.as_bytes();
        let end = loop {
            if self.cur == bytes.len() {
                break self.cur;
            }
            if bytes[self.cur].is_ascii_whitespace() {
                break self.cur;
            }
            self.cur += 1;
        };
        self.holding = Holding::Word((start, end - start));
    }

    /// Scan a quoted text literal: skip whitespace, then take everything up
    /// to the closing `"`. The characters land in the holding area in the
    /// order they were typed.
    pub fn advance_str(&mut self) -> Result<(), ()> {
        self.holding = Holding::None;

        let start = match self.next_nonwhitespace() {
            Some(s) => s,
            None => return Err(()),
        };

        let bytes = self.buf.as_bytes();
        let end = loop {
            if self.cur == bytes.len() {
                return Err(());
            }
            if bytes[self.cur] == b'"' {
                // Move past the quote by one. Okay if this is now the end.
                let pre_quote = self.cur;
                self.cur += 1;
                break pre_quote;
            }
            self.cur += 1;
        };

        self.holding = Holding::Str((start, end - start));
        Ok(())
    }

    pub fn cur_str_literal(&self) -> Option<&str> {
        match &self.holding {
            Holding::Str((start, len)) => Some(&self.buf[*start..(*start + *len)]),
            _ => None,
        }
    }

    pub fn cur_word(&self) -> Option<&str> {
        match &self.holding {
            Holding::Word((start, len)) => Some(&self.buf[*start..(*start + *len)]),
            _ => None,
        }
    }
}

impl Default for WordStrBuf {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub mod test {
    use super::WordStrBuf;

    #[test]
    fn tokens() {
        let mut input = WordStrBuf::new();
        input.fill("  2 3  + .  ").unwrap();
        for expected in ["2", "3", "+", "."] {
            input.advance();
            assert_eq!(input.cur_word(), Some(expected));
        }
        input.advance();
        assert_eq!(input.cur_word(), None);
        // Advancing past the end stays at the end
        input.advance();
        assert_eq!(input.cur_word(), None);
    }

    #[test]
    fn case_is_preserved_in_the_buffer() {
        let mut input = WordStrBuf::new();
        input.fill("DUP Mixed").unwrap();
        input.advance();
        assert_eq!(input.cur_word(), Some("DUP"));
        input.advance();
        assert_eq!(input.cur_word(), Some("Mixed"));
    }

    #[test]
    fn str_literal_keeps_typed_order() {
        let mut input = WordStrBuf::new();
        input.fill(r#"." hello, World!" 99"#).unwrap();
        input.advance();
        assert_eq!(input.cur_word(), Some(r#".""#));
        input.advance_str().unwrap();
        assert_eq!(input.cur_str_literal(), Some("hello, World!"));
        input.advance();
        assert_eq!(input.cur_word(), Some("99"));
    }

    #[test]
    fn unterminated_str_literal() {
        let mut input = WordStrBuf::new();
        input.fill(r#"s" no closing quote"#).unwrap();
        input.advance();
        assert!(input.advance_str().is_err());
        assert_eq!(input.cur_str_literal(), None);
    }

    #[test]
    fn non_ascii_rejected() {
        let mut input = WordStrBuf::new();
        assert!(input.fill("café").is_err());
    }
}
