use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::lexer::Primitive;
use crate::parser::Expression;

/// Represents a function while the program is running. Different to Expression as
/// values can also be partial applications, promises and captured continuations.
///
/// Every value is a function, so there is nothing a value can be applied to that
/// would be an error.
#[derive(Clone)]
pub enum Value {
    Primitive(Primitive),
    /// `` `kX ``, ignores its argument and returns `X`
    K1(Rc<Value>),
    /// `` `sX ``
    S1(Rc<Value>),
    /// ` ``sXY `, applied to `Z` evaluates ``` ``XZ`YZ ```
    S2(Rc<Value>, Rc<Value>),
    /// `` `dE ``, a promise to evaluate `E` once the promise itself is applied
    Delayed(Rc<Term>),
    /// The rest of the computation at the point `c` was applied
    Continuation(Continuation),
}

impl Value {
    pub fn is_primitive(&self, primitive: Primitive) -> bool {
        matches!(self, Self::Primitive(p) if *p == primitive)
    }
}

impl From<Primitive> for Value {
    fn from(primitive: Primitive) -> Self {
        Self::Primitive(primitive)
    }
}

impl fmt::Display for Value {
    /// Renders the value as the Unlambda source that would produce it. Continuations
    /// have no source form and show up as `<cont>`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_source(f, Shown::Value(self))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let display = self as &dyn fmt::Display;

        display.fmt(f)
    }
}

impl PartialEq for Value {
    /// Structural equality, except that promises and continuations are only equal to
    /// themselves.
    fn eq(&self, other: &Value) -> bool {
        let mut pending = vec![(self, other)];

        while let Some((a, b)) = pending.pop() {
            match (a, b) {
                (Self::Primitive(a), Self::Primitive(b)) if a == b => {},
                (Self::K1(a), Self::K1(b)) | (Self::S1(a), Self::S1(b)) => {
                    if !Rc::ptr_eq(a, b) {
                        pending.push((a.as_ref(), b.as_ref()));
                    }
                },
                (Self::S2(a_x, a_y), Self::S2(b_x, b_y)) => {
                    pending.push((a_y.as_ref(), b_y.as_ref()));
                    pending.push((a_x.as_ref(), b_x.as_ref()));
                },
                (Self::Delayed(a), Self::Delayed(b)) if Rc::ptr_eq(a, b) => {},
                (Self::Continuation(a), Self::Continuation(b)) if a.ptr_eq(b) => {},
                _ => return false,
            }
        }

        true
    }
}

impl Drop for Value {
    // curried chains like `k`k`k...i grow as deep as the program makes them
    fn drop(&mut self) {
        if self.drops_shallowly() {
            return;
        }

        let mut teardown = Teardown::new();

        teardown.detach_value(self);
        teardown.run();
    }
}

impl Value {
    fn drops_shallowly(&self) -> bool {
        match self {
            Self::Primitive(_) => true,
            Self::K1(x) | Self::S1(x) => is_leaf_value(x),
            Self::S2(x, y) => is_leaf_value(x) && is_leaf_value(y),
            Self::Delayed(term) => is_leaf_term(term),
            Self::Continuation(continuation) => continuation.0.as_ref().map_or(true, |link| Rc::strong_count(link) > 1),
        }
    }
}

/// Dropping this reference only decrements a count or frees a single node
fn is_leaf_value(value: &Rc<Value>) -> bool {
    Rc::strong_count(value) > 1 || matches!(value.as_ref(), Value::Primitive(_))
}

fn is_leaf_term(term: &Rc<Term>) -> bool {
    Rc::strong_count(term) > 1 || !matches!(term.as_ref(), Term::Application(..))
}

/// Something still to be evaluated. Parts of the source program are referenced as
/// they are, while applications built during reduction mix in values that have
/// already been reduced.
#[derive(Clone)]
pub enum Term {
    Expression(Rc<Expression>),
    Value(Value),
    Application(Rc<Term>, Rc<Term>),
}

impl Term {
    /// `` `FX `` for two values that are already reduced
    pub fn apply_values(function: Value, argument: Value) -> Self {
        Self::Application(Rc::new(Self::Value(function)), Rc::new(Self::Value(argument)))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_source(f, Shown::Term(self))
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let display = self as &dyn fmt::Display;

        display.fmt(f)
    }
}

impl Drop for Term {
    fn drop(&mut self) {
        // a held value tears itself down
        let shallow = match self {
            Self::Expression(_) | Self::Value(_) => true,
            Self::Application(lhs, rhs) => is_leaf_term(lhs) && is_leaf_term(rhs),
        };

        if shallow {
            return;
        }

        let mut teardown = Teardown::new();

        teardown.detach_term(self);
        teardown.run();
    }
}

enum Shown<'a> {
    Value(&'a Value),
    Term(&'a Term),
}

/// Both kinds are written in prefix form, so children only need to be queued
/// right to left
fn write_source(f: &mut fmt::Formatter<'_>, root: Shown<'_>) -> fmt::Result {
    let mut pending = vec![root];

    while let Some(shown) = pending.pop() {
        match shown {
            Shown::Value(value) => match value {
                Value::Primitive(primitive) => write!(f, "{primitive}")?,
                Value::K1(x) => {
                    f.write_str("`k")?;
                    pending.push(Shown::Value(x));
                },
                Value::S1(x) => {
                    f.write_str("`s")?;
                    pending.push(Shown::Value(x));
                },
                Value::S2(x, y) => {
                    f.write_str("``s")?;
                    pending.push(Shown::Value(y));
                    pending.push(Shown::Value(x));
                },
                Value::Delayed(term) => {
                    f.write_str("`d")?;
                    pending.push(Shown::Term(term));
                },
                Value::Continuation(_) => f.write_str("<cont>")?,
            },
            Shown::Term(term) => match term {
                Term::Expression(expression) => write!(f, "{expression}")?,
                Term::Value(value) => pending.push(Shown::Value(value)),
                Term::Application(lhs, rhs) => {
                    f.write_str("`")?;
                    pending.push(Shown::Term(rhs));
                    pending.push(Shown::Term(lhs));
                },
            },
        }
    }

    Ok(())
}

enum Detached {
    Value(Rc<Value>),
    Term(Rc<Term>),
    Link(Rc<Link>),
}

/// Takes apart a runtime structure one node at a time. Each uniquely owned child is
/// swapped for a shared leaf and queued, so no drop ever recurses more than one level.
struct Teardown {
    pending: Vec<Detached>,
    value_leaf: Rc<Value>,
    term_leaf: Rc<Term>,
}

impl Teardown {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
            value_leaf: Rc::new(Value::Primitive(Primitive::I)),
            term_leaf: Rc::new(Term::Value(Value::Primitive(Primitive::I))),
        }
    }

    fn detach_value(&mut self, value: &mut Value) {
        match value {
            Value::Primitive(_) => {},
            Value::K1(x) | Value::S1(x) => {
                let x = mem::replace(x, self.value_leaf.clone());
                self.pending.push(Detached::Value(x));
            },
            Value::S2(x, y) => {
                let x = mem::replace(x, self.value_leaf.clone());
                let y = mem::replace(y, self.value_leaf.clone());
                self.pending.push(Detached::Value(x));
                self.pending.push(Detached::Value(y));
            },
            Value::Delayed(term) => {
                let term = mem::replace(term, self.term_leaf.clone());
                self.pending.push(Detached::Term(term));
            },
            Value::Continuation(continuation) => {
                if let Some(link) = continuation.0.take() {
                    self.pending.push(Detached::Link(link));
                }
            },
        }
    }

    fn detach_term(&mut self, term: &mut Term) {
        match term {
            Term::Expression(_) => {},
            Term::Value(value) => self.detach_value(value),
            Term::Application(lhs, rhs) => {
                let lhs = mem::replace(lhs, self.term_leaf.clone());
                let rhs = mem::replace(rhs, self.term_leaf.clone());
                self.pending.push(Detached::Term(lhs));
                self.pending.push(Detached::Term(rhs));
            },
        }
    }

    fn run(&mut self) {
        while let Some(detached) = self.pending.pop() {
            // shared nodes are still in use elsewhere and only lose a count here
            match detached {
                Detached::Value(value) => {
                    if let Ok(mut value) = Rc::try_unwrap(value) {
                        self.detach_value(&mut value);
                    }
                },
                Detached::Term(term) => {
                    if let Ok(mut term) = Rc::try_unwrap(term) {
                        self.detach_term(&mut term);
                    }
                },
                Detached::Link(link) => {
                    if let Ok(mut link) = Rc::try_unwrap(link) {
                        match &mut link.frame {
                            Frame::AwaitOperand(term) => self.detach_term(term),
                            Frame::AwaitApply(value) => self.detach_value(value),
                        }

                        if let Some(next) = link.next.0.take() {
                            self.pending.push(Detached::Link(next));
                        }
                    }
                },
            }
        }
    }
}

/// One pending step of the computation
#[derive(Clone, Debug)]
pub enum Frame {
    /// The operator of an application is being evaluated; the operand comes next.
    AwaitOperand(Term),
    /// The operand is being evaluated; the operator is already known.
    AwaitApply(Value),
}

struct Link {
    frame: Frame,
    next: Continuation,
}

/// The rest of a computation, as a chain of frames that is never changed once built.
///
/// Pushing a frame makes a new chain sharing its tail with the old one, so a captured
/// continuation can be resumed any number of times and always sees the frames as they
/// were when it was captured. The empty chain means evaluation is done.
#[derive(Clone, Default)]
pub struct Continuation(Option<Rc<Link>>);

impl Continuation {
    pub fn done() -> Self {
        Self(None)
    }

    pub fn is_done(&self) -> bool {
        self.0.is_none()
    }

    /// A continuation that runs `frame` and then carries on with this one
    pub fn push(&self, frame: Frame) -> Self {
        Self(Some(Rc::new(Link { frame, next: self.clone() })))
    }

    /// The innermost frame and the continuation beneath it
    pub fn split(&self) -> Option<(&Frame, &Continuation)> {
        self.0.as_deref().map(|link| (&link.frame, &link.next))
    }

    /// Number of frames in the chain
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut continuation = self;

        while let Some((_, next)) = continuation.split() {
            depth += 1;
            continuation = next;
        }

        depth
    }

    /// True if both refer to the very same chain
    pub fn ptr_eq(&self, other: &Continuation) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Drop for Continuation {
    // chains grow as deep as the program recurses, so release them iteratively
    fn drop(&mut self) {
        let mut link = self.0.take();

        while let Some(shared) = link {
            match Rc::try_unwrap(shared) {
                Ok(mut owned) => link = owned.next.0.take(),
                Err(_) => break,
            }
        }
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<cont of depth {}>", self.depth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_string;

    #[test]
    fn test_displays_curried_values() {
        let k = Value::from(Primitive::K);
        let value = Value::S2(Rc::new(Value::K1(Rc::new(k.clone()))), Rc::new(Value::from(Primitive::Print('x'))));

        assert_eq!(value.to_string(), "``s`kk.x");
    }

    #[test]
    fn test_displays_promises() {
        let expression = Rc::new(parse_string("`.ai").unwrap());
        let value = Value::Delayed(Rc::new(Term::Expression(expression)));

        assert_eq!(value.to_string(), "`d`.ai");
        assert_eq!(Value::Continuation(Continuation::done()).to_string(), "<cont>");
    }

    #[test]
    fn test_values_compare_structurally() {
        let a = Value::K1(Rc::new(Value::from(Primitive::I)));
        let b = Value::K1(Rc::new(Value::from(Primitive::I)));

        assert_eq!(a, b);
        assert_ne!(a, Value::S1(Rc::new(Value::from(Primitive::I))));
        assert!(Value::from(Primitive::D).is_primitive(Primitive::D));
    }

    #[test]
    fn test_push_shares_the_tail() {
        let base = Continuation::done().push(Frame::AwaitApply(Value::from(Primitive::I)));
        let left = base.push(Frame::AwaitApply(Value::from(Primitive::K)));
        let right = base.push(Frame::AwaitApply(Value::from(Primitive::S)));

        assert_eq!(left.depth(), 2);
        assert_eq!(right.depth(), 2);
        assert!(left.split().unwrap().1.ptr_eq(&base));
        assert!(right.split().unwrap().1.ptr_eq(&base));
        assert_eq!(base.depth(), 1);
    }

    #[test]
    fn test_captured_continuation_outlives_its_extensions() {
        let base = Continuation::done().push(Frame::AwaitApply(Value::from(Primitive::V)));
        let captured = Value::Continuation(base.clone());

        drop(base.push(Frame::AwaitApply(Value::from(Primitive::K))));
        drop(base);

        let Value::Continuation(continuation) = &captured else {
            unreachable!()
        };

        assert!(matches!(continuation.split(), Some((Frame::AwaitApply(v), next)) if v.is_primitive(Primitive::V) && next.is_done()));
    }

    fn curried_chain(depth: usize) -> Value {
        let mut value = Value::from(Primitive::I);

        for _ in 0..depth {
            value = Value::K1(Rc::new(value));
        }

        value
    }

    #[test]
    fn test_deep_values_display_and_compare() {
        let a = curried_chain(500_000);
        let b = curried_chain(500_000);

        assert_eq!(a.to_string().len(), 2 * 500_000 + 1);
        assert!(a == b);
        assert!(a != curried_chain(499_999));
    }

    #[test]
    fn test_dropping_deep_values_and_terms() {
        drop(curried_chain(1_000_000));

        let mut term = Term::Value(Value::from(Primitive::I));

        for _ in 0..1_000_000 {
            term = Term::Application(Rc::new(term), Rc::new(Term::Value(Value::from(Primitive::K))));
        }

        // a promise holding a deep term, inside a continuation frame, inside a value
        let promise = Value::Delayed(Rc::new(term));
        let frames = Continuation::done().push(Frame::AwaitApply(promise));

        drop(Value::S2(Rc::new(curried_chain(1_000_000)), Rc::new(Value::Continuation(frames))));
    }

    #[test]
    fn test_shared_parts_survive_a_teardown() {
        let shared = Rc::new(curried_chain(3));
        let outer = Value::S2(Rc::new(Value::K1(shared.clone())), Rc::new(Value::from(Primitive::V)));

        drop(outer);

        assert_eq!(Rc::strong_count(&shared), 1);
        assert_eq!(shared.to_string(), "`k`k`ki");
    }

    #[test]
    fn test_dropping_a_deep_chain() {
        let mut continuation = Continuation::done();

        for _ in 0..1_000_000 {
            continuation = continuation.push(Frame::AwaitApply(Value::from(Primitive::I)));
        }

        assert_eq!(continuation.depth(), 1_000_000);
    }
}
