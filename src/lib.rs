#![cfg_attr(not(any(test, feature = "use-std")), no_std)]

extern crate alloc;

pub mod dictionary;
pub mod fastr;
pub mod input;
pub mod output;
pub mod stack;
pub mod vm;
pub mod word;

cfg_if::cfg_if! {
    if #[cfg(any(test, feature = "use-std"))] {
        pub mod testutil;
    }
}

pub use crate::vm::Forth;
pub use crate::word::Word;

use crate::{
    dictionary::MemError, output::OutputError, stack::StackError, word::WordError,
};

/// The outer interpreter's two states: execute words now, or append them
/// to the definition under construction.
#[derive(Debug)]
pub enum Mode {
    Run,
    Compile,
}

#[derive(Debug, PartialEq)]
pub enum Error {
    Stack(StackError),
    Mem(MemError),
    Output(OutputError),
    Word(WordError),
    /// Token is neither a dictionary word nor a number. The only
    /// recoverable condition: the driver reports it and keeps going.
    LookupFailed,
    WordNotInDict,
    ColonCompileMissingName,
    SemicolonWithoutColon,
    InterpretingCompileOnlyWord,
    LQuoteMissingRQuote,
    BadCodeField,
    CompiledCellNotCallable,
    DivideByZero,
    LoopCountIsNegative,
    WordToUsizeInvalid(i32),
    UsizeToWordInvalid(usize),
}

impl From<StackError> for Error {
    fn from(se: StackError) -> Self {
        Error::Stack(se)
    }
}

impl From<MemError> for Error {
    fn from(me: MemError) -> Self {
        Error::Mem(me)
    }
}

impl From<OutputError> for Error {
    fn from(oe: OutputError) -> Self {
        Error::Output(oe)
    }
}

impl From<WordError> for Error {
    fn from(we: WordError) -> Self {
        Error::Word(we)
    }
}

impl From<core::fmt::Error> for Error {
    fn from(_fe: core::fmt::Error) -> Self {
        Error::Output(OutputError::FormattingErr)
    }
}

/// `WordFunc` is the shape of every native behavior: builtins, the
/// threading primitives, and host extensions added at runtime.
pub type WordFunc<T> = fn(&mut Forth<T>) -> Result<(), Error>;

trait ReplaceErr {
    type OK;
    fn replace_err<NE>(self, t: NE) -> Result<Self::OK, NE>;
}

impl<T, OE> ReplaceErr for Result<T, OE> {
    type OK = T;
    #[inline]
    fn replace_err<NE>(self, e: NE) -> Result<Self::OK, NE> {
        match self {
            Ok(t) => Ok(t),
            Err(_e) => Err(e),
        }
    }
}

#[cfg(test)]
pub mod test {
    use crate::{
        stack::StackError,
        vm::ForthParams,
        word::Word,
        Error, Forth,
    };

    #[derive(Default)]
    struct TestContext {
        contents: Vec<i32>,
    }

    #[test]
    fn forth() {
        let mut forth = Forth::new(
            ForthParams::default(),
            TestContext::default(),
            Forth::<TestContext>::FULL_BUILTINS,
        )
        .unwrap();

        let lines = &[
            ("2 3 + .", "5 ok.\n"),
            ("10 3 - .", "7 ok.\n"),
            ("( a comment disappears ) 1 .", "1 ok.\n"),
            (": yay 2 3 + . ;", "ok.\n"),
            ("yay yay yay", "5 5 5 ok.\n"),
            (": boop yay yay ;", "ok.\n"),
            ("boop", "5 5 ok.\n"),
            (": err if boop boop boop else yay yay then ;", "ok.\n"),
            (": erf if boop boop boop then yay yay ;", "ok.\n"),
            ("0 err", "5 5 ok.\n"),
            ("1 err", "5 5 5 5 5 5 ok.\n"),
            ("0 erf", "5 5 ok.\n"),
            ("1 erf", "5 5 5 5 5 5 5 5 ok.\n"),
            (": one 1 . ;", "ok.\n"),
            (": two 2 . ;", "ok.\n"),
            (": six 6 . ;", "ok.\n"),
            (": nif if one if two two else six then one then ;", "ok.\n"),
            ("  0 nif", "ok.\n"),
            ("0 1 nif", "1 6 1 ok.\n"),
            ("1 1 nif", "1 2 2 1 ok.\n"),
            ("42 emit", "*ok.\n"),
            (": star 42 emit ;", "ok.\n"),
            ("star star star", "***ok.\n"),
            // begin/until runs the body at least once and loops while the
            // flag is false
            (": count 0 begin 1 + dup dup . 10 = until drop ;", "ok.\n"),
            ("count", "1 2 3 4 5 6 7 8 9 10 ok.\n"),
            (": t 0 begin 1 + dup 100 = until ;", "ok.\n"),
            ("t .", "100 ok.\n"),
            // begin/while/repeat exits mid-loop the moment the guard fails
            (": down 5 begin dup 0 > while dup . 1 - repeat drop ;", "ok.\n"),
            ("down", "5 4 3 2 1 ok.\n"),
            (": beep .\" hello, world!\" ;", "ok.\n"),
            ("beep", "hello, world!ok.\n"),
            (".\" direct\"", "directok.\n"),
            ("123 constant x", "ok.\n"),
            ("x .", "123 ok.\n"),
            ("4 x + .", "127 ok.\n"),
            ("variable y", "ok.\n"),
            ("y @ .", "0 ok.\n"),
            ("10 y !", "ok.\n"),
            ("y @ .", "10 ok.\n"),
            // comparison results are tagged booleans
            ("1 2 < .", "true ok.\n"),
            ("1 2 > .", "false ok.\n"),
            ("true not .", "false ok.\n"),
            ("1 2 < 3 4 < and .", "true ok.\n"),
            ("5 dup = .", "true ok.\n"),
            // stack shufflers
            ("1 2 swap . .", "1 2 ok.\n"),
            ("1 2 over . . .", "1 2 1 ok.\n"),
            ("1 2 3 rot . . .", "1 3 2 ok.\n"),
            ("1 2 2dup . . . .", "2 1 2 1 ok.\n"),
            ("7 negate .", "-7 ok.\n"),
            ("17 5 mod .", "2 ok.\n"),
            ("20 4 / .", "5 ok.\n"),
            // text cells on the stack keep their typed order and case
            ("s\" forth\" type", "forthok.\n"),
            (": greet2 s\" WoRlD\" type ;", "ok.\n"),
            ("greet2", "WoRlDok.\n"),
            // unknown tokens are reported and the line keeps going
            ("floop 2 3 + .", "floop ?\n5 ok.\n"),
            (": bad flurb 7 . ;", "flurb ?\nok.\n"),
            ("bad", "7 ok.\n"),
            // shadowing: newest wins by name, old references keep working
            (": greet 1 . ;", "ok.\n"),
            (": cheer greet greet ;", "ok.\n"),
            (": greet 2 . ;", "ok.\n"),
            ("greet", "2 ok.\n"),
            ("cheer", "1 1 ok.\n"),
            // tick + execute behaves exactly like direct execution
            ("' greet execute", "2 ok.\n"),
            ("' cheer execute", "1 1 ok.\n"),
            // word/create compose; the new header is findable by name
            ("word tmp2 create ' tmp2 drop", "ok.\n"),
            // compile-time evaluation via [ ] literal
            (": four [ 2 2 + ] literal ;", "ok.\n"),
            ("four .", "4 ok.\n"),
            // an immediate definition runs while compiling, not at runtime
            (": star2 star star ; immediate", "ok.\n"),
            (": s4 star2 star2 ;", "****ok.\n"),
            ("s4", "ok.\n"),
            // here/allot move the append cursor both ways
            ("here 5 allot here swap - .", "5 ok.\n"),
            ("here 3 allot -3 allot here = .", "true ok.\n"),
        ];

        for (line, out) in lines {
            println!("{}", line);
            forth.input.fill(line).unwrap();
            forth.process_line().unwrap();
            print!(" => {}", forth.output.as_str());
            assert_eq!(forth.output.as_str(), *out);
            forth.output.clear();
        }

        // A definition may span lines; compile mode persists across them.
        forth.input.fill(": half").unwrap();
        forth.process_line().unwrap();
        forth.input.fill("2 / ;").unwrap();
        forth.process_line().unwrap();
        forth.output.clear();
        forth.input.fill("10 half .").unwrap();
        forth.process_line().unwrap();
        assert_eq!(forth.output.as_str(), "5 ok.\n");
        forth.output.clear();

        // Hard faults abort the line and leave clean stacks behind.
        forth.input.fill("10 0 /").unwrap();
        assert_eq!(forth.process_line(), Err(Error::DivideByZero));
        forth.input.fill("drop").unwrap();
        assert_eq!(
            forth.process_line(),
            Err(Error::Stack(StackError::StackEmpty))
        );
        forth.input.fill("then").unwrap();
        assert_eq!(
            forth.process_line(),
            Err(Error::InterpretingCompileOnlyWord)
        );

        forth.output.clear();
        forth.input.fill("boop yay").unwrap();
        forth.process_line().unwrap();
        assert_eq!(forth.output.as_str(), "5 5 5 ok.\n");

        let mut any_stacks = false;
        while let Some(dsw) = forth.data_stack.pop() {
            println!("DSW: {:?}", dsw);
            any_stacks = true;
        }
        assert!(!any_stacks);

        // Takes one value off the stack, and stores it in the vec
        fn squirrel(forth: &mut Forth<TestContext>) -> Result<(), crate::Error> {
            let val = forth.data_stack.try_pop()?.as_int()?;
            forth.host_ctxt.contents.push(val);
            Ok(())
        }
        forth.add_builtin("squirrel", squirrel).unwrap();

        let lines = &[
            ("5 6 squirrel squirrel", "ok.\n"),
            (": sq3 squirrel squirrel squirrel ;", "ok.\n"),
            ("1 2 3 sq3", "ok.\n"),
        ];

        forth.output.clear();
        for (line, out) in lines {
            println!("{}", line);
            forth.input.fill(line).unwrap();
            forth.process_line().unwrap();
            print!(" => {}", forth.output.as_str());
            assert_eq!(forth.output.as_str(), *out);
            forth.output.clear();
        }

        let context = forth.release();
        assert_eq!(&context.contents, &[6, 5, 3, 2, 1]);
    }

    #[test]
    fn independent_instances() {
        let mut a = Forth::new(ForthParams::default(), (), Forth::<()>::FULL_BUILTINS).unwrap();
        let mut b = Forth::new(ForthParams::default(), (), Forth::<()>::FULL_BUILTINS).unwrap();

        a.input.fill(": twice 2 * ;").unwrap();
        a.process_line().unwrap();

        // `twice` exists only in the VM that defined it
        b.input.fill("1 twice").unwrap();
        b.process_line().unwrap();
        assert_eq!(b.output.as_str(), "twice ?\nok.\n");
        assert_eq!(b.data_stack.pop(), Some(Word::Int(1)));

        a.output.clear();
        a.input.fill("21 twice .").unwrap();
        a.process_line().unwrap();
        assert_eq!(a.output.as_str(), "42 ok.\n");
    }
}
