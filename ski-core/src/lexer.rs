use std::fmt;

use crate::parser::ParseError;

/// One of the builtin Unlambda functions. Every program is built out of these and
/// backquote application alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    S,
    K,
    I,
    V,
    C,
    D,
    E,
    /// `r`, prints a newline
    R,
    /// `@`, reads a character into the current character register
    Read,
    /// `|`, hands the current character to its argument as a printing function
    Pipe,
    /// `.x`, prints its character
    Print(char),
    /// `?x`, tests the current character against its own
    Compare(char),
}

impl Primitive {
    /// Maps a single character function to its primitive. Letters are case insensitive.
    pub fn from_char(c: char) -> Option<Self> {
        let primitive = match c.to_ascii_lowercase() {
            's' => Self::S,
            'k' => Self::K,
            'i' => Self::I,
            'v' => Self::V,
            'c' => Self::C,
            'd' => Self::D,
            'e' => Self::E,
            'r' => Self::R,
            '@' => Self::Read,
            '|' => Self::Pipe,
            _ => return None,
        };

        Some(primitive)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S => f.write_str("s"),
            Self::K => f.write_str("k"),
            Self::I => f.write_str("i"),
            Self::V => f.write_str("v"),
            Self::C => f.write_str("c"),
            Self::D => f.write_str("d"),
            Self::E => f.write_str("e"),
            Self::R => f.write_str("r"),
            Self::Read => f.write_str("@"),
            Self::Pipe => f.write_str("|"),
            Self::Print(c) => write!(f, ".{c}"),
            Self::Compare(c) => write!(f, "?{c}"),
        }
    }
}

/// True for the characters `.x` and `?x` may carry: printable ASCII and newline.
pub fn is_program_char(c: char) -> bool {
    c == '\n' || (' '..='~').contains(&c)
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n')
}

/// A location in program source. `offset` counts characters, lines and columns start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn start() -> Self {
        Self { offset: 0, line: 1, column: 1 }
    }

    fn advance(&mut self, c: char) {
        self.offset += 1;

        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// The backquote
    Apply,
    Primitive(Primitive),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

/// Splits Unlambda source into tokens on demand, skipping whitespace and comments
/// between them. Whatever has not been consumed yet stays available through
/// [`Lexer::remaining`].
pub struct Lexer<'a> {
    source: &'a str,
    byte: usize,
    position: Position,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, byte: 0, position: Position::start() }
    }

    /// Position of the next unconsumed character
    pub fn position(&self) -> Position {
        self.position
    }

    /// The source text that has not been consumed yet
    pub fn remaining(&self) -> &'a str {
        &self.source[self.byte..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;

        self.byte += c.len_utf8();
        self.position.advance(c);

        Some(c)
    }

    /// Skips whitespace and comments. A comment starts at `#` and runs through the
    /// next newline, or to the end of the source.
    pub fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else if is_whitespace(c) {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// Reads the next token, or `None` once only trivia is left.
    pub fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.skip_trivia();

        let position = self.position;

        let Some(c) = self.bump() else {
            return Ok(None);
        };

        let kind = match c {
            '`' => TokenKind::Apply,
            '.' | '?' => {
                // the payload is taken verbatim, even when it is whitespace or `#`
                let payload_position = self.position;
                let payload = self.bump().ok_or(ParseError::UnexpectedEnd {
                    expected: "a character after `.` or `?`",
                    position: payload_position,
                })?;

                if !is_program_char(payload) {
                    return Err(ParseError::UnexpectedChar { found: payload, position: payload_position });
                }

                if c == '.' {
                    TokenKind::Primitive(Primitive::Print(payload))
                } else {
                    TokenKind::Primitive(Primitive::Compare(payload))
                }
            },
            c => match Primitive::from_char(c) {
                Some(primitive) => TokenKind::Primitive(primitive),
                None => {
                    return Err(ParseError::UnexpectedChar { found: c, position });
                }
            },
        };

        Ok(Some(Token { kind, position }))
    }
}
