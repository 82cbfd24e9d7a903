use ski_core::{parse_string, EvalError, Interpreter};

use wasm_bindgen::prelude::*;

/// Reduction steps a browser run may take before it is stopped
pub const STEP_LIMIT: u64 = 50_000_000;

/// Runs `source` with `input` and returns what it printed, or a description of why
/// it could not run
#[wasm_bindgen]
pub fn run(source: &str, input: &str) -> String {
    let program = match parse_string(source) {
        Ok(program) => program,
        Err(error) => return format!("parse error: {error}"),
    };

    match Interpreter::new(input).with_step_limit(STEP_LIMIT).evaluate(&program) {
        Ok(evaluation) => evaluation.io.into_output(),
        Err(EvalError::StepLimitExceeded { limit, output }) => {
            format!("{output}\n[stopped after {limit} steps]")
        },
        Err(error) => format!("error: {error}"),
    }
}
