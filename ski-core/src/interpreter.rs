use std::rc::Rc;

use log::{debug, trace, warn};
use thiserror::Error;

use crate::io::IoContext;
use crate::lexer::Primitive;
use crate::parser::Expression;
use crate::program::{Continuation, Frame, Term, Value};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Reduction reached a function with no application rule. Only `d` can be in that
    /// position, and it is always intercepted before its operand is evaluated, so this
    /// points at a bug in the interpreter rather than in the program.
    #[error("internal evaluator error: no application rule for `{function}`")]
    Inapplicable { function: String },

    #[error("gave up after {limit} reduction steps")]
    StepLimitExceeded { limit: u64, output: String },
}

/// A finished run of a program
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub result: Value,
    pub io: IoContext,
    /// Reduction steps taken
    pub steps: u64,
    /// True if the program stopped itself with `e`
    pub exited: bool,
}

impl Evaluation {
    pub fn output(&self) -> &str {
        self.io.output()
    }
}

/// What the reduction loop does next. Each arm of the loop produces the following step
/// instead of calling into it, which keeps the native stack flat however deep the
/// program recurses.
enum Step {
    /// Reduce a term to a value, then continue
    Eval(Term, Continuation),
    /// Hand a value to a continuation
    Continue(Continuation, Value),
    /// Apply a function to a reduced argument, then continue
    Apply(Value, Value, Continuation),
    Finish(Value),
    Exit(Value),
}

pub struct Interpreter {
    io: IoContext,
    step_limit: Option<u64>,
}

impl Interpreter {
    pub fn new(input: &str) -> Self {
        Self { io: IoContext::new(input), step_limit: None }
    }

    /// Gives up with [`EvalError::StepLimitExceeded`] once `limit` steps have been taken
    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = Some(limit);
        self
    }

    pub fn evaluate(self, program: &Expression) -> Result<Evaluation, EvalError> {
        debug!("evaluating a program of {} primitives", program.size());

        self.run(Term::Expression(Rc::new(program.clone())))
    }

    fn run(mut self, term: Term) -> Result<Evaluation, EvalError> {
        let mut step = Step::Eval(term, Continuation::done());
        let mut steps: u64 = 0;

        loop {
            step = match step {
                Step::Finish(result) => return Ok(self.finish(result, steps, false)),
                Step::Exit(result) => return Ok(self.finish(result, steps, true)),
                _ if self.step_limit.is_some_and(|limit| steps >= limit) => {
                    warn!("stopping after {steps} steps");

                    return Err(EvalError::StepLimitExceeded { limit: steps, output: self.io.into_output() });
                },
                Step::Eval(term, continuation) => eval(term, continuation),
                Step::Continue(continuation, value) => resume(continuation, value),
                Step::Apply(function, argument, continuation) => self.apply(function, argument, continuation)?,
            };

            steps += 1;
        }
    }

    fn finish(self, result: Value, steps: u64, exited: bool) -> Evaluation {
        debug!("finished after {steps} steps with {result}");

        Evaluation { result, io: self.io, steps, exited }
    }

    fn apply(&mut self, function: Value, argument: Value, continuation: Continuation) -> Result<Step, EvalError> {
        let step = match &function {
            Value::Primitive(primitive) => match *primitive {
                Primitive::I => Step::Continue(continuation, argument),
                Primitive::K => Step::Continue(continuation, Value::K1(Rc::new(argument))),
                Primitive::S => Step::Continue(continuation, Value::S1(Rc::new(argument))),
                Primitive::V => Step::Continue(continuation, Value::Primitive(Primitive::V)),
                Primitive::C => {
                    trace!("capturing a continuation of depth {}", continuation.depth());

                    let captured = Value::Continuation(continuation.clone());

                    Step::Eval(Term::apply_values(argument, captured), continuation)
                },
                Primitive::E => {
                    trace!("exiting with {argument}");

                    Step::Exit(argument)
                },
                Primitive::R => {
                    self.io.write('\n');
                    Step::Continue(continuation, argument)
                },
                Primitive::Print(c) => {
                    self.io.write(c);
                    Step::Continue(continuation, argument)
                },
                Primitive::Read => {
                    let flag = match self.io.read() {
                        Some(_) => Primitive::I,
                        None => Primitive::V,
                    };

                    Step::Eval(Term::apply_values(argument, flag.into()), continuation)
                },
                Primitive::Compare(c) => {
                    let flag = if self.io.current() == Some(c) { Primitive::I } else { Primitive::V };

                    Step::Eval(Term::apply_values(argument, flag.into()), continuation)
                },
                Primitive::Pipe => {
                    let echo = match self.io.current() {
                        Some(c) => Primitive::Print(c),
                        None => Primitive::V,
                    };

                    Step::Eval(Term::apply_values(argument, echo.into()), continuation)
                },
                Primitive::D => {
                    return Err(EvalError::Inapplicable { function: primitive.to_string() });
                },
            },
            Value::K1(x) => Step::Continue(continuation, x.as_ref().clone()),
            Value::S1(x) => Step::Continue(continuation, Value::S2(x.clone(), Rc::new(argument))),
            Value::S2(x, y) => {
                // the argument is shared by both halves, not copied
                let argument = Rc::new(Term::Value(argument));
                let lhs = Term::Application(Rc::new(Term::Value(x.as_ref().clone())), argument.clone());
                let rhs = Term::Application(Rc::new(Term::Value(y.as_ref().clone())), argument);

                Step::Eval(Term::Application(Rc::new(lhs), Rc::new(rhs)), continuation)
            },
            Value::Delayed(promise) => {
                Step::Eval(Term::Application(promise.clone(), Rc::new(Term::Value(argument))), continuation)
            },
            Value::Continuation(saved) => {
                trace!("resuming a continuation of depth {}", saved.depth());

                Step::Continue(saved.clone(), argument)
            },
        };

        Ok(step)
    }
}

fn eval(term: Term, continuation: Continuation) -> Step {
    // clones here are shallow: only the `Rc` counts of the children change
    match &term {
        Term::Value(value) => Step::Continue(continuation, value.clone()),
        Term::Application(lhs, rhs) => Step::Eval(
            lhs.as_ref().clone(),
            continuation.push(Frame::AwaitOperand(rhs.as_ref().clone())),
        ),
        Term::Expression(expression) => match expression.as_ref() {
            Expression::Primitive(primitive) => Step::Continue(continuation, Value::Primitive(*primitive)),
            Expression::Application(lhs, rhs) => Step::Eval(
                Term::Expression(lhs.clone()),
                continuation.push(Frame::AwaitOperand(Term::Expression(rhs.clone()))),
            ),
        },
    }
}

fn resume(continuation: Continuation, value: Value) -> Step {
    let Some((frame, next)) = continuation.split() else {
        return Step::Finish(value);
    };

    match frame {
        // `d` keeps its operand as it is, unevaluated
        Frame::AwaitOperand(operand) if value.is_primitive(Primitive::D) => {
            Step::Continue(next.clone(), Value::Delayed(Rc::new(operand.clone())))
        },
        Frame::AwaitOperand(operand) => Step::Eval(operand.clone(), next.push(Frame::AwaitApply(value))),
        Frame::AwaitApply(function) => Step::Apply(function.clone(), value, next.clone()),
    }
}

/// Runs a parsed program against the given input
pub fn evaluate(program: &Expression, input: &str) -> Result<Evaluation, EvalError> {
    Interpreter::new(input).evaluate(program)
}
