use std::io::{stdin, stdout, Write};

use fifth::{vm::ForthParams, Forth};

/// Bootstrap definitions, drained before any interactive input.
const BOOT_SCRIPT: &[&str] = &[
    ": 1+ 1 + ;",
    ": 1- 1 - ;",
    ": 0= 0 = ;",
    ": 0< 0 < ;",
    ": max 2dup < if swap then drop ;",
    ": min 2dup > if swap then drop ;",
    ": ? @ . ;",
];

fn main() {
    let params = ForthParams {
        data_stack_elems: 1024,
        return_stack_elems: 1024,
        dict_cells: 16 * 1024,
        output_cap: 4096,
    };
    let mut forth = Forth::new(params, (), Forth::<()>::FULL_BUILTINS).unwrap();

    for line in BOOT_SCRIPT {
        feed(&mut forth, line, false);
    }

    let mut inp = String::new();
    loop {
        print!("> ");
        stdout().flush().unwrap();
        inp.clear();
        // End of input is a clean exit, not an error.
        if stdin().read_line(&mut inp).unwrap() == 0 {
            println!();
            break;
        }
        feed(&mut forth, &inp, true);
    }
}

fn feed(forth: &mut Forth<()>, line: &str, echo: bool) {
    forth.input.fill(line).unwrap();
    match forth.process_line() {
        Ok(_) => {
            if echo {
                print!("{}", forth.output.as_str());
            }
        }
        Err(e) => {
            println!();
            println!("Input failed. Error: {:?}", e);
            println!("Unprocessed tokens:");
            while let Some(tok) = forth.input.cur_word() {
                print!("'{}', ", tok);
                forth.input.advance();
            }
            println!();
        }
    }
    forth.output.clear();
}
