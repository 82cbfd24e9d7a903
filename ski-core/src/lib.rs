pub mod lexer;
pub mod parser;
pub mod program;
pub mod io;
pub mod interpreter;

pub use lexer::*;
pub use parser::*;
pub use program::*;
pub use io::*;
pub use interpreter::*;

use thiserror::Error;

/// Anything that can stop a program from running to completion
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Parses `source` and runs it against `input`
pub fn run(source: &str, input: &str) -> Result<Evaluation, Error> {
    let program = parse_string(source)?;

    Ok(evaluate(&program, input)?)
}
