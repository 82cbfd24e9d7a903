use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::lexer::{Lexer, Position, Primitive, TokenKind};

/// Represents any legal Unlambda program
#[derive(Clone)]
pub enum Expression {
    /// One of the builtin functions
    Primitive(Primitive),
    /// `` `FG ``, the left expression applied to the right one
    Application(Rc<Expression>, Rc<Expression>),
}

impl Expression {
    pub fn application(lhs: Expression, rhs: Expression) -> Self {
        Self::Application(Rc::new(lhs), Rc::new(rhs))
    }

    /// Counts the primitives in the tree
    pub fn size(&self) -> usize {
        let mut pending = vec![self];
        let mut size = 0;

        while let Some(expression) = pending.pop() {
            match expression {
                Self::Primitive(_) => size += 1,
                Self::Application(lhs, rhs) => {
                    pending.push(rhs);
                    pending.push(lhs);
                },
            }
        }

        size
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Expression) -> bool {
        let mut pending = vec![(self, other)];

        while let Some((a, b)) = pending.pop() {
            match (a, b) {
                (Self::Primitive(a), Self::Primitive(b)) if a == b => {},
                (Self::Application(a_lhs, a_rhs), Self::Application(b_lhs, b_rhs)) => {
                    if !Rc::ptr_eq(a_rhs, b_rhs) {
                        pending.push((a_rhs.as_ref(), b_rhs.as_ref()));
                    }
                    if !Rc::ptr_eq(a_lhs, b_lhs) {
                        pending.push((a_lhs.as_ref(), b_lhs.as_ref()));
                    }
                },
                _ => return false,
            }
        }

        true
    }
}

impl Eq for Expression {}

impl fmt::Display for Expression {
    /// Writes the expression back out as minimal Unlambda source: lowercase letters,
    /// no whitespace and no comments
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pending = vec![self];

        while let Some(expression) = pending.pop() {
            match expression {
                Self::Primitive(primitive) => write!(f, "{primitive}")?,
                Self::Application(lhs, rhs) => {
                    f.write_str("`")?;
                    pending.push(rhs);
                    pending.push(lhs);
                },
            }
        }

        Ok(())
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d: &dyn fmt::Display = &self;
        d.fmt(f)
    }
}

impl Drop for Expression {
    // Programs can nest applications far deeper than the native stack allows to
    // unwind recursively, so children are detached and released from a worklist.
    fn drop(&mut self) {
        let Self::Application(lhs, rhs) = self else {
            return;
        };

        if is_leaf(lhs) && is_leaf(rhs) {
            return;
        }

        let leaf = Rc::new(Self::Primitive(Primitive::I));
        let mut pending = Vec::new();

        detach_children(self, &leaf, &mut pending);

        while let Some(child) = pending.pop() {
            if let Ok(mut inner) = Rc::try_unwrap(child) {
                detach_children(&mut inner, &leaf, &mut pending);
            }
        }
    }
}

fn is_leaf(expression: &Rc<Expression>) -> bool {
    matches!(expression.as_ref(), Expression::Primitive(_))
}

fn detach_children(expression: &mut Expression, leaf: &Rc<Expression>, pending: &mut Vec<Rc<Expression>>) {
    if let Expression::Application(lhs, rhs) = expression {
        pending.push(std::mem::replace(lhs, leaf.clone()));
        pending.push(std::mem::replace(rhs, leaf.clone()));
    }
}

/// Ways a program can fail to parse
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input at {position}, expected {expected}")]
    UnexpectedEnd { expected: &'static str, position: Position },

    #[error("unexpected character {found:?} at {position}")]
    UnexpectedChar { found: char, position: Position },

    #[error("unexpected input after the end of the program at {position}")]
    TrailingInput { position: Position },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedEnd,
    UnexpectedChar,
    TrailingInput,
}

impl ParseError {
    pub fn kind(&self) -> ParseErrorKind {
        match self {
            Self::UnexpectedEnd { .. } => ParseErrorKind::UnexpectedEnd,
            Self::UnexpectedChar { .. } => ParseErrorKind::UnexpectedChar,
            Self::TrailingInput { .. } => ParseErrorKind::TrailingInput,
        }
    }

    /// Where in the source the problem was found
    pub fn position(&self) -> Position {
        match self {
            Self::UnexpectedEnd { position, .. } => *position,
            Self::UnexpectedChar { position, .. } => *position,
            Self::TrailingInput { position } => *position,
        }
    }
}

/// Parses a whole program. Whitespace and comments may follow the expression, but
/// nothing else.
pub fn parse_string(source: &str) -> Result<Expression, ParseError> {
    let mut lexer = Lexer::new(source);
    let expression = parse_expression(&mut lexer)?;

    lexer.skip_trivia();

    if !lexer.remaining().is_empty() {
        return Err(ParseError::TrailingInput { position: lexer.position() });
    }

    Ok(expression)
}

/// Parses one expression from the front of `source` and hands back the text that
/// follows it, untouched.
pub fn parse_prefix(source: &str) -> Result<(Expression, &str), ParseError> {
    let mut lexer = Lexer::new(source);
    let expression = parse_expression(&mut lexer)?;

    Ok((expression, lexer.remaining()))
}

fn parse_expression(lexer: &mut Lexer) -> Result<Expression, ParseError> {
    // applications still being built: `None` waits for its operator, `Some` holds the
    // operator and waits for the operand
    let mut open = Vec::<Option<Expression>>::new();

    loop {
        let token = lexer.next_token()?.ok_or_else(|| ParseError::UnexpectedEnd {
            expected: "an expression",
            position: lexer.position(),
        })?;

        let mut expression = match token.kind {
            TokenKind::Apply => {
                open.push(None);
                continue;
            },
            TokenKind::Primitive(primitive) => Expression::Primitive(primitive),
        };

        loop {
            match open.pop() {
                None => return Ok(expression),
                Some(None) => {
                    open.push(Some(expression));
                    break;
                },
                Some(Some(lhs)) => {
                    expression = Expression::application(lhs, expression);
                },
            }
        }
    }
}
