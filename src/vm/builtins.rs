use core::fmt::Write;

use alloc::rc::Rc;

use crate::{
    dictionary::Dictionary,
    fastr::FaStr,
    word::Word,
    Error, Mode, ReplaceErr,
};

use super::{addr_to_i32, i32_to_addr, BuiltinEntry, Forth};

// NOTE: This macro exists because spelling out the struct literal for
// every row of the table drowns the name/function pairing. Immediate words
// use the second form.
macro_rules! builtin {
    ($name:literal, $func:expr) => {
        BuiltinEntry {
            name: $name,
            immediate: false,
            func: $func,
        }
    };
}

macro_rules! builtin_imm {
    ($name:literal, $func:expr) => {
        BuiltinEntry {
            name: $name,
            immediate: true,
            func: $func,
        }
    };
}

impl<T: 'static> Forth<T> {
    /// The full word set seeded into a new VM's dictionary.
    ///
    /// The parenthesized names are the threading primitives the compiler
    /// emits references to; they are ordinary dictionary entries, found by
    /// name, but not meant to be typed at the prompt.
    pub const FULL_BUILTINS: &'static [BuiltinEntry<T>] = &[
        // threading primitives
        builtin!("(docol)", Self::docol),
        builtin!("(exit)", Self::exit),
        builtin!("(literal)", Self::literal),
        builtin!("(jmp)", Self::jump),
        builtin!("(jump-zero)", Self::jump_if_zero),
        builtin!("(write-str)", Self::write_str_lit),
        builtin!("(dovar)", Self::dovar),
        builtin!("(doconst)", Self::doconst),
        // arithmetic and comparison
        builtin!("+", Self::add),
        builtin!("-", Self::sub),
        builtin!("*", Self::mul),
        builtin!("/", Self::div),
        builtin!("mod", Self::modu),
        builtin!("negate", Self::negate),
        builtin!("=", Self::equal),
        builtin!("<", Self::less_than),
        builtin!(">", Self::greater_than),
        builtin!("and", Self::logical_and),
        builtin!("or", Self::logical_or),
        builtin!("not", Self::invert),
        builtin!("true", Self::lit_true),
        builtin!("false", Self::lit_false),
        // stack shufflers
        builtin!("dup", Self::dup),
        builtin!("drop", Self::drop_top),
        builtin!("swap", Self::swap),
        builtin!("over", Self::over),
        builtin!("rot", Self::rot),
        builtin!("2dup", Self::dup_2),
        builtin!("2drop", Self::drop_2),
        builtin!("2swap", Self::swap_2),
        builtin!("2over", Self::over_2),
        // memory
        builtin!("@", Self::fetch),
        builtin!("!", Self::store),
        builtin!(",", Self::comma),
        builtin!("here", Self::here),
        builtin!("allot", Self::allot),
        // output
        builtin!(".", Self::pop_print),
        builtin!("emit", Self::emit),
        builtin!("cr", Self::cr),
        builtin!("spaces", Self::spaces),
        builtin!("type", Self::type_str),
        // defining words
        builtin!(":", Self::colon),
        builtin_imm!(";", Self::semicolon),
        builtin!("create", Self::create),
        builtin!("variable", Self::variable),
        builtin!("constant", Self::constant),
        builtin!("word", Self::word_token),
        builtin!("'", Self::tick),
        builtin!("execute", Self::execute_xt),
        builtin!("immediate", Self::immediate),
        builtin!("abort", Self::abort),
        // compiler state
        builtin_imm!("[", Self::lbracket),
        builtin!("]", Self::rbracket),
        builtin_imm!("literal", Self::literal_from_stack),
        // control flow
        builtin_imm!("if", Self::comp_if),
        builtin_imm!("else", Self::comp_else),
        builtin_imm!("then", Self::comp_then),
        builtin_imm!("begin", Self::comp_begin),
        builtin_imm!("until", Self::comp_until),
        builtin_imm!("while", Self::comp_while),
        builtin_imm!("repeat", Self::comp_repeat),
        // text and comments
        builtin_imm!("(", Self::paren_comment),
        builtin_imm!(r#".""#, Self::dot_quote),
        builtin_imm!(r#"s""#, Self::s_quote),
    ];

    //
    // Threading primitives
    //

    /// `(docol)` is the code field behavior of every colon definition:
    /// save the instruction pointer and enter the threaded body just past
    /// the code field.
    pub fn docol(&mut self) -> Result<(), Error> {
        self.return_stack.push(Word::Int(addr_to_i32(self.ip)?))?;
        self.ip = self.cw + 1;
        Ok(())
    }

    /// `(exit)` terminates a threaded body: pop the saved instruction
    /// pointer back into `ip`.
    pub fn exit(&mut self) -> Result<(), Error> {
        let saved = self.return_stack.try_pop()?;
        self.ip = i32_to_addr(saved.as_int()?)?;
        Ok(())
    }

    /// `(literal)` pushes the cell that follows it in the threaded body.
    /// Works for any tag, so numbers, text, and booleans compile the same
    /// way.
    pub fn literal(&mut self) -> Result<(), Error> {
        let val = self.dict.load(self.ip)?.clone();
        self.ip += 1;
        self.data_stack.push(val)?;
        Ok(())
    }

    /// `(jmp)`: the cell at `ip` holds a relative offset, and `ip` points
    /// at that cell while the add happens. Offset 0 is a self-jump,
    /// offset 1 falls through.
    pub fn jump(&mut self) -> Result<(), Error> {
        let off = self.dict.load(self.ip)?.as_int()?;
        let target = addr_to_i32(self.ip)?.wrapping_add(off);
        self.ip = i32_to_addr(target)?;
        Ok(())
    }

    /// `(jump-zero)`: pop a flag; false or zero takes the jump, anything
    /// else falls through past the offset cell.
    pub fn jump_if_zero(&mut self) -> Result<(), Error> {
        let flag = self.data_stack.try_pop()?;
        if flag.truthy() {
            self.ip += 1;
            Ok(())
        } else {
            self.jump()
        }
    }

    /// `(write-str)` prints the text cell that follows it in the body.
    pub fn write_str_lit(&mut self) -> Result<(), Error> {
        let lit = self.dict.load(self.ip)?.clone();
        self.ip += 1;
        self.output.push_str(lit.as_str()?)?;
        Ok(())
    }

    /// `(dovar)`: push the address of the storage cell just past the code
    /// field.
    pub fn dovar(&mut self) -> Result<(), Error> {
        self.data_stack
            .push(Word::Int(addr_to_i32(self.cw + 1)?))?;
        Ok(())
    }

    /// `(doconst)`: push the value cell just past the code field.
    pub fn doconst(&mut self) -> Result<(), Error> {
        let val = self.dict.load(self.cw + 1)?.clone();
        self.data_stack.push(val)?;
        Ok(())
    }

    //
    // Arithmetic and comparison
    //

    // Binary operands pop right-then-left: `a b -` computes a - b.
    fn bin_int(&mut self) -> Result<(i32, i32), Error> {
        let b = self.data_stack.try_pop()?.as_int()?;
        let a = self.data_stack.try_pop()?.as_int()?;
        Ok((a, b))
    }

    pub fn add(&mut self) -> Result<(), Error> {
        let (a, b) = self.bin_int()?;
        self.data_stack.push(Word::Int(a.wrapping_add(b)))?;
        Ok(())
    }

    pub fn sub(&mut self) -> Result<(), Error> {
        let (a, b) = self.bin_int()?;
        self.data_stack.push(Word::Int(a.wrapping_sub(b)))?;
        Ok(())
    }

    pub fn mul(&mut self) -> Result<(), Error> {
        let (a, b) = self.bin_int()?;
        self.data_stack.push(Word::Int(a.wrapping_mul(b)))?;
        Ok(())
    }

    pub fn div(&mut self) -> Result<(), Error> {
        let (a, b) = self.bin_int()?;
        if b == 0 {
            return Err(Error::DivideByZero);
        }
        self.data_stack.push(Word::Int(a.wrapping_div(b)))?;
        Ok(())
    }

    pub fn modu(&mut self) -> Result<(), Error> {
        let (a, b) = self.bin_int()?;
        if b == 0 {
            return Err(Error::DivideByZero);
        }
        self.data_stack.push(Word::Int(a.wrapping_rem(b)))?;
        Ok(())
    }

    pub fn negate(&mut self) -> Result<(), Error> {
        let a = self.data_stack.try_pop()?.as_int()?;
        self.data_stack.push(Word::Int(a.wrapping_neg()))?;
        Ok(())
    }

    pub fn equal(&mut self) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(Word::Bool(a == b))?;
        Ok(())
    }

    pub fn less_than(&mut self) -> Result<(), Error> {
        let (a, b) = self.bin_int()?;
        self.data_stack.push(Word::Bool(a < b))?;
        Ok(())
    }

    pub fn greater_than(&mut self) -> Result<(), Error> {
        let (a, b) = self.bin_int()?;
        self.data_stack.push(Word::Bool(a > b))?;
        Ok(())
    }

    pub fn logical_and(&mut self) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(Word::Bool(a.truthy() && b.truthy()))?;
        Ok(())
    }

    pub fn logical_or(&mut self) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(Word::Bool(a.truthy() || b.truthy()))?;
        Ok(())
    }

    pub fn invert(&mut self) -> Result<(), Error> {
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(Word::Bool(!a.truthy()))?;
        Ok(())
    }

    pub fn lit_true(&mut self) -> Result<(), Error> {
        self.data_stack.push(Word::Bool(true))?;
        Ok(())
    }

    pub fn lit_false(&mut self) -> Result<(), Error> {
        self.data_stack.push(Word::Bool(false))?;
        Ok(())
    }

    //
    // Stack shufflers
    //

    pub fn dup(&mut self) -> Result<(), Error> {
        let val = self.data_stack.try_peek()?;
        self.data_stack.push(val)?;
        Ok(())
    }

    pub fn drop_top(&mut self) -> Result<(), Error> {
        self.data_stack.try_pop()?;
        Ok(())
    }

    pub fn swap(&mut self) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(b)?;
        self.data_stack.push(a)?;
        Ok(())
    }

    pub fn over(&mut self) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(a.clone())?;
        self.data_stack.push(b)?;
        self.data_stack.push(a)?;
        Ok(())
    }

    pub fn rot(&mut self) -> Result<(), Error> {
        // ( a b c -- b c a )
        let c = self.data_stack.try_pop()?;
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(b)?;
        self.data_stack.push(c)?;
        self.data_stack.push(a)?;
        Ok(())
    }

    pub fn dup_2(&mut self) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(a.clone())?;
        self.data_stack.push(b.clone())?;
        self.data_stack.push(a)?;
        self.data_stack.push(b)?;
        Ok(())
    }

    pub fn drop_2(&mut self) -> Result<(), Error> {
        self.data_stack.try_pop()?;
        self.data_stack.try_pop()?;
        Ok(())
    }

    pub fn swap_2(&mut self) -> Result<(), Error> {
        // ( a b c d -- c d a b )
        let d = self.data_stack.try_pop()?;
        let c = self.data_stack.try_pop()?;
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(c)?;
        self.data_stack.push(d)?;
        self.data_stack.push(a)?;
        self.data_stack.push(b)?;
        Ok(())
    }

    pub fn over_2(&mut self) -> Result<(), Error> {
        // ( a b c d -- a b c d a b )
        let d = self.data_stack.try_pop()?;
        let c = self.data_stack.try_pop()?;
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(a.clone())?;
        self.data_stack.push(b.clone())?;
        self.data_stack.push(c)?;
        self.data_stack.push(d)?;
        self.data_stack.push(a)?;
        self.data_stack.push(b)?;
        Ok(())
    }

    //
    // Memory
    //

    pub fn fetch(&mut self) -> Result<(), Error> {
        let addr = i32_to_addr(self.data_stack.try_pop()?.as_int()?)?;
        let val = self.dict.load(addr)?.clone();
        self.data_stack.push(val)?;
        Ok(())
    }

    pub fn store(&mut self) -> Result<(), Error> {
        let addr = i32_to_addr(self.data_stack.try_pop()?.as_int()?)?;
        let val = self.data_stack.try_pop()?;
        self.dict.store(addr, val)?;
        Ok(())
    }

    pub fn comma(&mut self) -> Result<(), Error> {
        let val = self.data_stack.try_pop()?;
        self.dict.append(val)?;
        Ok(())
    }

    pub fn here(&mut self) -> Result<(), Error> {
        self.data_stack
            .push(Word::Int(addr_to_i32(self.dict.here())?))?;
        Ok(())
    }

    /// Pop a cell count and resize the arena: grow zero-filled, or shrink
    /// by truncating the topmost cells.
    pub fn allot(&mut self) -> Result<(), Error> {
        let delta = self.data_stack.try_pop()?.as_int()?;
        self.dict.resize(delta)?;
        Ok(())
    }

    //
    // Output
    //

    pub fn pop_print(&mut self) -> Result<(), Error> {
        let a = self.data_stack.try_pop()?;
        write!(&mut self.output, "{} ", a)?;
        Ok(())
    }

    pub fn emit(&mut self) -> Result<(), Error> {
        let val = self.data_stack.try_pop()?.as_int()?;
        self.output.push_char((val as u8) as char)?;
        Ok(())
    }

    pub fn cr(&mut self) -> Result<(), Error> {
        self.output.push_str("\n")?;
        Ok(())
    }

    pub fn spaces(&mut self) -> Result<(), Error> {
        let num = self.data_stack.try_pop()?.as_int()?;
        if num.is_negative() {
            return Err(Error::LoopCountIsNegative);
        }
        for _ in 0..num {
            self.output.push_str(" ")?;
        }
        Ok(())
    }

    pub fn type_str(&mut self) -> Result<(), Error> {
        let val = self.data_stack.try_pop()?;
        self.output.push_str(val.as_str()?)?;
        Ok(())
    }

    //
    // Defining words
    //

    /// `:` reads a name, lays down an unlinked header with a `(docol)`
    /// code field, and switches to compile mode. The body accretes one
    /// token at a time until `;`.
    pub fn colon(&mut self) -> Result<(), Error> {
        self.input.advance();
        let name = match self.input.cur_word() {
            Some(w) => FaStr::new_from(w),
            None => return Err(Error::ColonCompileMissingName),
        };
        let docol = self.find_word("(docol)").ok_or(Error::WordNotInDict)?;
        let code = self.dict.load(Dictionary::entry_cfa(docol))?.clone();
        let hdr = self.dict.allocate_header(&name, false)?;
        self.dict.append(code)?;
        self.pending_def = Some(hdr);
        self.mode = Mode::Compile;
        Ok(())
    }

    /// `;` caps the body with `(exit)`, publishes the header, and returns
    /// to run mode. Immediate: it must act during compilation.
    pub fn semicolon(&mut self) -> Result<(), Error> {
        let hdr = self.pending_def.take().ok_or(Error::SemicolonWithoutColon)?;
        let exit = self.find_word("(exit)").ok_or(Error::WordNotInDict)?;
        self.dict.append(Word::Xt(Dictionary::entry_cfa(exit)))?;
        self.dict.link(hdr)?;
        self.mode = Mode::Run;
        Ok(())
    }

    /// `create` pops a name and publishes a bare header: no code field,
    /// no body. Composes with `word`.
    pub fn create(&mut self) -> Result<(), Error> {
        let name_cell = self.data_stack.try_pop()?;
        let name = FaStr::new_from(name_cell.as_str()?);
        let hdr = self.dict.allocate_header(&name, false)?;
        self.dict.link(hdr)?;
        Ok(())
    }

    /// `variable NAME`: a header whose code field pushes the address of
    /// its one zero-initialized storage cell.
    pub fn variable(&mut self) -> Result<(), Error> {
        self.input.advance();
        let name = match self.input.cur_word() {
            Some(w) => FaStr::new_from(w),
            None => return Err(Error::ColonCompileMissingName),
        };
        let dovar = self.find_word("(dovar)").ok_or(Error::WordNotInDict)?;
        let code = self.dict.load(Dictionary::entry_cfa(dovar))?.clone();
        let hdr = self.dict.allocate_header(&name, false)?;
        self.dict.append(code)?;
        self.dict.append(Word::Int(0))?;
        self.dict.link(hdr)?;
        Ok(())
    }

    /// `VALUE constant NAME`: a header whose code field pushes the value
    /// cell captured at definition time.
    pub fn constant(&mut self) -> Result<(), Error> {
        let val = self.data_stack.try_pop()?;
        self.input.advance();
        let name = match self.input.cur_word() {
            Some(w) => FaStr::new_from(w),
            None => return Err(Error::ColonCompileMissingName),
        };
        let doconst = self.find_word("(doconst)").ok_or(Error::WordNotInDict)?;
        let code = self.dict.load(Dictionary::entry_cfa(doconst))?.clone();
        let hdr = self.dict.allocate_header(&name, false)?;
        self.dict.append(code)?;
        self.dict.append(val)?;
        self.dict.link(hdr)?;
        Ok(())
    }

    /// `word` exposes the tokenizer as a word: push the next input token
    /// as a text cell.
    pub fn word_token(&mut self) -> Result<(), Error> {
        self.input.advance();
        let cell = match self.input.cur_word() {
            Some(w) => Word::Str(Rc::from(w)),
            None => return Err(Error::ColonCompileMissingName),
        };
        self.data_stack.push(cell)?;
        Ok(())
    }

    /// `'` (tick) reads a name and pushes its execution token.
    pub fn tick(&mut self) -> Result<(), Error> {
        self.input.advance();
        let hdr = {
            let word = self
                .input
                .cur_word()
                .ok_or(Error::ColonCompileMissingName)?;
            self.find_word(word).ok_or(Error::LookupFailed)?
        };
        self.data_stack
            .push(Word::Xt(Dictionary::entry_cfa(hdr)))?;
        Ok(())
    }

    /// `execute` pops an execution token and runs it, interpreted or
    /// native, then resumes the caller.
    pub fn execute_xt(&mut self) -> Result<(), Error> {
        let cfa = self.data_stack.try_pop()?.as_xt()?;
        self.execute(cfa)
    }

    /// `immediate` marks the most recent definition immediate.
    pub fn immediate(&mut self) -> Result<(), Error> {
        let hdr = self.dict.tail.ok_or(Error::WordNotInDict)?;
        self.dict.set_immediate(hdr)?;
        Ok(())
    }

    /// `abort`: clear both stacks, drop a half-built definition, and land
    /// back in run mode.
    pub fn abort(&mut self) -> Result<(), Error> {
        self.data_stack.clear();
        self.return_stack.clear();
        self.pending_def = None;
        self.mode = Mode::Run;
        Ok(())
    }

    //
    // Compiler state
    //

    pub fn lbracket(&mut self) -> Result<(), Error> {
        self.mode = Mode::Run;
        Ok(())
    }

    pub fn rbracket(&mut self) -> Result<(), Error> {
        self.mode = Mode::Compile;
        Ok(())
    }

    /// `literal` (immediate): pop a compile-time value and compile it into
    /// the body as `(literal) value`.
    pub fn literal_from_stack(&mut self) -> Result<(), Error> {
        self.require_compile()?;
        let val = self.data_stack.try_pop()?;
        self.compile_literal(val)
    }

    //
    // Control flow
    //
    // All compile-time: each word edits the body under construction and
    // carries patch addresses on the data stack. The offsets are relative
    // to the offset cell itself (see `jump`).
    //

    fn require_compile(&self) -> Result<(), Error> {
        match self.mode {
            Mode::Compile => Ok(()),
            Mode::Run => Err(Error::InterpretingCompileOnlyWord),
        }
    }

    fn compile_branch(&mut self, opcode: &str) -> Result<(), Error> {
        let op = self.find_word(opcode).ok_or(Error::WordNotInDict)?;
        self.dict.append(Word::Xt(Dictionary::entry_cfa(op)))?;
        Ok(())
    }

    /// `if`: forward conditional branch; the placeholder offset's address
    /// rides the data stack until `else` or `then` patches it.
    pub fn comp_if(&mut self) -> Result<(), Error> {
        self.require_compile()?;
        self.compile_branch("(jump-zero)")?;
        let at = self.dict.append(Word::Int(0))?;
        self.data_stack.push(Word::Int(addr_to_i32(at)?))?;
        Ok(())
    }

    /// `then`: patch the pending forward branch to land right here.
    pub fn comp_then(&mut self) -> Result<(), Error> {
        self.require_compile()?;
        let at = i32_to_addr(self.data_stack.try_pop()?.as_int()?)?;
        let off = addr_to_i32(self.dict.here())? - addr_to_i32(at)?;
        self.dict.store(at, Word::Int(off))?;
        Ok(())
    }

    /// `else`: patch `if`'s branch to land just past the unconditional
    /// branch compiled here, and leave that branch's placeholder for
    /// `then`.
    pub fn comp_else(&mut self) -> Result<(), Error> {
        self.require_compile()?;
        let at = i32_to_addr(self.data_stack.try_pop()?.as_int()?)?;
        let off = addr_to_i32(self.dict.here())? - addr_to_i32(at)? + 2;
        self.dict.store(at, Word::Int(off))?;
        self.compile_branch("(jmp)")?;
        let ph = self.dict.append(Word::Int(0))?;
        self.data_stack.push(Word::Int(addr_to_i32(ph)?))?;
        Ok(())
    }

    /// `begin`: remember the loop re-entry address; nothing is compiled.
    pub fn comp_begin(&mut self) -> Result<(), Error> {
        self.require_compile()?;
        self.data_stack
            .push(Word::Int(addr_to_i32(self.dict.here())?))?;
        Ok(())
    }

    /// `until`: backward conditional branch closing a post-condition loop.
    pub fn comp_until(&mut self) -> Result<(), Error> {
        self.require_compile()?;
        let target = self.data_stack.try_pop()?.as_int()?;
        self.compile_branch("(jump-zero)")?;
        let at = addr_to_i32(self.dict.here())?;
        self.dict.append(Word::Int(target - at))?;
        Ok(())
    }

    /// `while`: forward conditional exit; its placeholder sits above the
    /// `begin` target on the stack.
    pub fn comp_while(&mut self) -> Result<(), Error> {
        self.require_compile()?;
        self.compile_branch("(jump-zero)")?;
        let ph = self.dict.append(Word::Int(0))?;
        self.data_stack.push(Word::Int(addr_to_i32(ph)?))?;
        Ok(())
    }

    /// `repeat`: unconditional branch back to the `begin` target, then
    /// patch the `while` exit to land past it.
    pub fn comp_repeat(&mut self) -> Result<(), Error> {
        self.require_compile()?;
        let ph = i32_to_addr(self.data_stack.try_pop()?.as_int()?)?;
        let target = self.data_stack.try_pop()?.as_int()?;
        self.compile_branch("(jmp)")?;
        let at = addr_to_i32(self.dict.here())?;
        self.dict.append(Word::Int(target - at))?;
        let off = addr_to_i32(self.dict.here())? - addr_to_i32(ph)?;
        self.dict.store(ph, Word::Int(off))?;
        Ok(())
    }

    //
    // Text and comments
    //

    /// `(`: consume input tokens through the closing paren.
    pub fn paren_comment(&mut self) -> Result<(), Error> {
        loop {
            self.input.advance();
            match self.input.cur_word() {
                Some(s) if s.ends_with(')') => return Ok(()),
                Some(_) => {}
                None => return Ok(()),
            }
        }
    }

    /// `."`: print quoted text. Immediately in run mode; compiled as
    /// `(write-str) text` otherwise.
    pub fn dot_quote(&mut self) -> Result<(), Error> {
        let lit = self.scan_str_literal()?;
        match self.mode {
            Mode::Run => self.output.push_str(&lit)?,
            Mode::Compile => {
                self.compile_branch("(write-str)")?;
                self.dict.append(Word::Str(lit))?;
            }
        }
        Ok(())
    }

    /// `s"`: materialize quoted text as one text cell. Pushed in run mode;
    /// compiled as `(literal) text` otherwise.
    pub fn s_quote(&mut self) -> Result<(), Error> {
        let lit = self.scan_str_literal()?;
        match self.mode {
            Mode::Run => self.data_stack.push(Word::Str(lit))?,
            Mode::Compile => self.compile_literal(Word::Str(lit))?,
        }
        Ok(())
    }

    // One text cell from the input, characters in typed order.
    fn scan_str_literal(&mut self) -> Result<Rc<str>, Error> {
        self.input
            .advance_str()
            .replace_err(Error::LQuoteMissingRQuote)?;
        match self.input.cur_str_literal() {
            Some(s) => Ok(Rc::from(s)),
            None => Err(Error::LQuoteMissingRQuote),
        }
    }
}

#[cfg(test)]
pub mod test {
    use crate::testutil::blocking_runtest;

    #[test]
    fn operand_order() {
        blocking_runtest(
            r#"
            > 3 4 + .
            < 7 ok.
            > 10 3 - .
            < 7 ok.
            > 6 7 * .
            < 42 ok.
            > 20 4 / .
            < 5 ok.
            > 17 5 mod .
            < 2 ok.
        "#,
        );
    }

    #[test]
    fn division_by_zero_faults() {
        blocking_runtest(
            r#"
            x 10 0 /
            x 10 0 mod
        "#,
        );
    }

    #[test]
    fn strings_preserve_typed_order() {
        // A reversed accumulator would print "htrof"; make sure the text
        // cell holds the characters as typed.
        blocking_runtest(
            r#"
            > s" forth" type
            < forthok.
            > : p s" forth" type ;
            > p
            < forthok.
            x s" dangling
        "#,
        );
    }

    #[test]
    fn variables_and_constants() {
        blocking_runtest(
            r#"
            > variable acc
            > acc @ .
            < 0 ok.
            > 41 acc !
            > acc @ 1 + .
            < 42 ok.
            > 7 constant lucky
            > lucky lucky + .
            < 14 ok.
        "#,
        );
    }

    #[test]
    fn hand_built_data() {
        blocking_runtest(
            r#"
            > variable cell0
            > 9 cell0 !
            > cell0 @ .
            < 9 ok.
            ( comma appends at here; fetch it back by address )
            > here 33 , @ .
            < 33 ok.
            > here 1 allot dup 44 swap ! @ .
            < 44 ok.
        "#,
        );
    }

    #[test]
    fn compile_only_words_fault_at_the_prompt() {
        blocking_runtest(
            r#"
            x then
            x else
            x until
            x repeat
            x ;
        "#,
        );
    }
}
