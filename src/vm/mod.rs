use core::fmt::Write;
use core::str::FromStr;

use alloc::vec::Vec;

use crate::{
    dictionary::Dictionary,
    fastr::{FaStr, TmpFaStr},
    input::WordStrBuf,
    output::OutputBuf,
    stack::Stack,
    word::Word,
    Error, Mode, ReplaceErr, WordFunc,
};

pub mod builtins;

/// Forth is the "context" of the VM/interpreter.
///
/// Every piece of state lives here: the unified cell arena (dictionary
/// headers, threaded code, and data all in one index-addressed region),
/// both stacks, the compiler mode, the instruction pointer, and the I/O
/// buffers. Instances are fully independent; nothing is global.
pub struct Forth<T: 'static> {
    mode: Mode,
    pub data_stack: Stack<Word>,
    pub(crate) return_stack: Stack<Word>,
    pub(crate) dict: Dictionary,
    funcs: Vec<WordFunc<T>>,
    /// Address of the cell about to execute.
    ip: usize,
    /// Code field of the word currently executing; compound entry uses it
    /// to locate its body.
    cw: usize,
    /// Header of a colon definition under construction. Unlinked until
    /// `;` completes it.
    pending_def: Option<usize>,
    pub input: WordStrBuf,
    pub output: OutputBuf,
    pub host_ctxt: T,
}

/// Sizing for one VM instance.
#[derive(Debug)]
pub struct ForthParams {
    pub data_stack_elems: usize,
    pub return_stack_elems: usize,
    pub dict_cells: usize,
    pub output_cap: usize,
}

impl Default for ForthParams {
    fn default() -> Self {
        Self {
            data_stack_elems: 256,
            return_stack_elems: 256,
            dict_cells: 4096,
            output_cap: 1024,
        }
    }
}

/// One native word provided to [`Forth::new`]: its name, its immediate
/// flag, and the host function implementing it.
pub struct BuiltinEntry<T: 'static> {
    pub name: &'static str,
    pub immediate: bool,
    pub func: WordFunc<T>,
}

enum Step {
    Done,
    NotDone,
}

pub(crate) fn addr_to_i32(addr: usize) -> Result<i32, Error> {
    i32::try_from(addr).replace_err(Error::UsizeToWordInvalid(addr))
}

pub(crate) fn i32_to_addr(val: i32) -> Result<usize, Error> {
    usize::try_from(val).replace_err(Error::WordToUsizeInvalid(val))
}

impl<T> Forth<T> {
    pub fn new(
        params: ForthParams,
        host_ctxt: T,
        builtins: &'static [BuiltinEntry<T>],
    ) -> Result<Self, Error> {
        let mut forth = Self {
            mode: Mode::Run,
            data_stack: Stack::new(params.data_stack_elems),
            return_stack: Stack::new(params.return_stack_elems),
            dict: Dictionary::new(params.dict_cells),
            funcs: Vec::new(),
            ip: 0,
            cw: 0,
            pending_def: None,
            input: WordStrBuf::new(),
            output: OutputBuf::new(params.output_cap),
            host_ctxt,
        };
        for bi in builtins {
            forth.add_builtin_entry(bi.name, bi.func, bi.immediate)?;
        }
        Ok(forth)
    }

    /// Register a host word at runtime. The entry goes into the same
    /// dictionary chain as everything else, so it can shadow and be
    /// shadowed like any other word.
    pub fn add_builtin(&mut self, name: &str, bi: WordFunc<T>) -> Result<(), Error> {
        self.add_builtin_entry(name, bi, false)
    }

    fn add_builtin_entry(
        &mut self,
        name: &str,
        bi: WordFunc<T>,
        immediate: bool,
    ) -> Result<(), Error> {
        let name = FaStr::new_from(name);
        let idx = self.funcs.len();
        self.funcs.push(bi);
        let hdr = self.dict.allocate_header(&name, immediate)?;
        self.dict.append(Word::Xt(idx))?;
        self.dict.link(hdr)?;
        Ok(())
    }

    fn parse_num(word: &str) -> Option<i32> {
        i32::from_str(word).ok()
    }

    /// Name lookup: newest-first, case-insensitive, read-only.
    pub fn find_word(&self, word: &str) -> Option<usize> {
        let fastr = TmpFaStr::new_from(word);
        self.dict.find(&fastr)
    }

    /// Run the outer interpreter over the current input buffer.
    ///
    /// Unknown tokens are reported to the output and skipped; any other
    /// fault aborts the line, clears both stacks, drops a half-built
    /// definition, and lands back in run mode before propagating.
    pub fn process_line(&mut self) -> Result<(), Error> {
        let res = (|| loop {
            match self.interpret_one() {
                Ok(Step::Done) => {
                    self.output.push_str("ok.\n")?;
                    break Ok(());
                }
                Ok(Step::NotDone) => {}
                Err(Error::LookupFailed) => {
                    let tok = self.input.cur_word().unwrap_or("");
                    write!(&mut self.output, "{} ?\n", tok)?;
                }
                Err(e) => break Err(e),
            }
        })();
        match res {
            Ok(()) => Ok(()),
            Err(e) => {
                self.data_stack.clear();
                self.return_stack.clear();
                self.pending_def = None;
                self.mode = Mode::Run;
                Err(e)
            }
        }
    }

    /// One step of the outer interpreter: take the next token and either
    /// execute it, compile it, or push/compile it as a literal.
    fn interpret_one(&mut self) -> Result<Step, Error> {
        self.input.advance();
        let (found, num) = {
            let word = match self.input.cur_word() {
                Some(w) => w,
                None => return Ok(Step::Done),
            };
            let found = self.find_word(word);
            let num = if found.is_none() {
                Self::parse_num(word)
            } else {
                None
            };
            (found, num)
        };

        match (found, num) {
            (Some(hdr), _) => {
                let immediate = self.dict.entry_immediate(hdr)?;
                let cfa = Dictionary::entry_cfa(hdr);
                if matches!(self.mode, Mode::Run) || immediate {
                    self.execute(cfa)?;
                } else {
                    self.dict.append(Word::Xt(cfa))?;
                }
            }
            (None, Some(val)) => match self.mode {
                Mode::Run => self.data_stack.push(Word::Int(val))?,
                Mode::Compile => self.compile_literal(Word::Int(val))?,
            },
            (None, None) => return Err(Error::LookupFailed),
        }
        Ok(Step::NotDone)
    }

    /// Append `(literal)` plus the value cell at `here`.
    pub(crate) fn compile_literal(&mut self, val: Word) -> Result<(), Error> {
        let lit = self.find_word("(literal)").ok_or(Error::WordNotInDict)?;
        self.dict.append(Word::Xt(Dictionary::entry_cfa(lit)))?;
        self.dict.append(val)?;
        Ok(())
    }

    /// Run the native behavior held in the code field at `cfa`.
    fn invoke(&mut self, cfa: usize) -> Result<(), Error> {
        let id = match self.dict.load(cfa)? {
            Word::Xt(id) => *id,
            _ => return Err(Error::BadCodeField),
        };
        let func = *self.funcs.get(id).ok_or(Error::BadCodeField)?;
        self.cw = cfa;
        func(self)
    }

    /// One dispatch step: fetch the cell at `ip`, advance, invoke.
    fn step(&mut self) -> Result<(), Error> {
        let cell = self.dict.load(self.ip)?.clone();
        self.ip += 1;
        match cell {
            Word::Xt(cfa) => self.invoke(cfa),
            _ => Err(Error::CompiledCellNotCallable),
        }
    }

    /// Run the word whose code field sits at `cfa` to completion and give
    /// control back to the caller.
    ///
    /// This is how native code calls interpreted code: the return-stack
    /// depth is the sentinel. A primitive returns without touching it; a
    /// compound word's entry pushes a frame, so the trampoline keeps
    /// stepping until its exit has popped back past that frame (restoring
    /// `ip` in the process).
    pub fn execute(&mut self, cfa: usize) -> Result<(), Error> {
        let sentinel = self.return_stack.depth();
        self.invoke(cfa)?;
        while self.return_stack.depth() > sentinel {
            self.step()?;
        }
        Ok(())
    }

    pub fn release(self) -> T {
        self.host_ctxt
    }
}

#[cfg(test)]
pub mod test {
    use crate::testutil::blocking_runtest;

    #[test]
    fn conditionals() {
        blocking_runtest(
            r#"
            > : abs dup 0 < if negate then ;
            > -7 abs .
            < 7 ok.
            > 7 abs .
            < 7 ok.
            > : pick if 10 else 20 then . ;
            > 0 pick
            < 20 ok.
            > 1 pick
            < 10 ok.
        "#,
        );
    }

    #[test]
    fn loops() {
        blocking_runtest(
            r#"
            > : sum 0 swap begin dup 0 > while dup rot + swap 1 - repeat drop ;
            ( accumulator kept under the counter; adds n, n-1, ... 1 )
            > 4 sum .
            < 10 ok.
            > : ten 0 begin 1 + dup 10 = until ;
            > ten .
            < 10 ok.
        "#,
        );
    }

    #[test]
    fn nested_calls_restore_the_caller() {
        blocking_runtest(
            r#"
            > : inner 1 . ;
            > : mid inner inner ;
            > : outer mid 9 . mid ;
            > outer
            < 1 1 9 1 1 ok.
        "#,
        );
    }

    #[test]
    fn data_stack_budget_faults_cleanly() {
        blocking_runtest(
            r#"
            ( data_stack_elems 2 )
            > 1 2
            x 3
            > 4 5
        "#,
        );
    }

    #[test]
    fn deep_word_nesting() {
        // Each layer adds one return-stack frame; the budget bounds it.
        blocking_runtest(
            r#"
            ( return_stack_elems 4 )
            > : a 1 . ;
            > : b a ;
            > : c b ;
            > c
            < 1 ok.
            > : d c ;
            > : e d ;
            x e
        "#,
        );
    }
}
