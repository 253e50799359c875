#![forbid(unsafe_code)]

//! Symbolic property paths.
//!
//! A [`PathExpr`] describes a chain of member accesses without executing
//! it. It is built either with the builder methods or parsed from text:
//!
//! ```ignore
//! let built = PathExpr::param::<Window>().member("Document").index([Value::new(3_i64)]).member("Title");
//! let parsed = PathExpr::parse(PathExpr::param::<Window>(), "Document[3].Title")?;
//! ```
//!
//! [`PathResolver`] checks the expression against the
//! [`TypeRegistry`](crate::reflect::TypeRegistry) and produces an immutable
//! [`PropertyPath`].

mod property_path;
mod resolver;

use std::fmt;
use std::sync::Arc;

pub use property_path::{PathRoot, PathSegment, PropertyPath};
pub use resolver::PathResolver;

use crate::error::{BindError, Result};
use crate::value::{Object, TypeInfo, Value};

/// A symbolic member-access chain.
#[derive(Clone, Debug)]
pub enum PathExpr {
    /// The object being bound.
    Parameter(TypeInfo),
    /// A fixed value.
    Constant(Value),
    /// `parent.name`
    Member { parent: Box<PathExpr>, name: Arc<str> },
    /// `parent[args]`
    Index {
        parent: Box<PathExpr>,
        args: Vec<PathExpr>,
    },
    /// A type conversion around `inner`. Stripped during resolution; the
    /// target type refines the declared type of the wrapped member.
    Convert { inner: Box<PathExpr>, to: TypeInfo },
}

impl PathExpr {
    /// Root at the bound object of type `T`.
    #[must_use]
    pub fn param<T: Object>() -> Self {
        Self::Parameter(TypeInfo::of::<T>())
    }

    /// Root at a bound object of any type.
    #[must_use]
    pub fn any_param() -> Self {
        Self::Parameter(TypeInfo::of::<dyn Object>())
    }

    #[must_use]
    pub fn constant(value: Value) -> Self {
        Self::Constant(value)
    }

    #[must_use]
    pub fn member(self, name: &str) -> Self {
        Self::Member {
            parent: Box::new(self),
            name: Arc::from(name),
        }
    }

    /// Index with constant arguments.
    #[must_use]
    pub fn index(self, args: impl IntoIterator<Item = Value>) -> Self {
        self.index_with(args.into_iter().map(Self::Constant).collect())
    }

    /// Index with arbitrary argument expressions.
    #[must_use]
    pub fn index_with(self, args: Vec<PathExpr>) -> Self {
        Self::Index {
            parent: Box::new(self),
            args,
        }
    }

    /// Wrap in a conversion to `U`.
    #[must_use]
    pub fn convert<U: ?Sized + 'static>(self) -> Self {
        Self::Convert {
            inner: Box::new(self),
            to: TypeInfo::of::<U>(),
        }
    }

    /// Parse `A.B[3].C` onto `root`.
    ///
    /// Integer literals become `i64`, quoted literals become `String`,
    /// `true`/`false` become `bool`. The empty string yields `root`.
    pub fn parse(root: PathExpr, text: &str) -> Result<Self> {
        Parser::new(text).parse(root)
    }

    /// Parse rooted at the bound object of type `T`.
    pub fn parse_for<T: Object>(text: &str) -> Result<Self> {
        Self::parse(Self::param::<T>(), text)
    }

    fn is_root(&self) -> bool {
        match self {
            Self::Parameter(_) | Self::Constant(_) => true,
            Self::Convert { inner, .. } => inner.is_root(),
            _ => false,
        }
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameter(_) => Ok(()),
            Self::Constant(value) => write!(f, "{value:?}"),
            Self::Member { parent, name } => {
                if parent.is_root() {
                    if let Self::Constant(_) = **parent {
                        write!(f, "{parent}.")?;
                    }
                } else {
                    write!(f, "{parent}.")?;
                }
                f.write_str(name)
            }
            Self::Index { parent, args } => {
                write!(f, "{parent}[")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match arg {
                        Self::Constant(value) => write_literal(f, value)?,
                        other => write!(f, "{{{other}}}")?,
                    }
                }
                f.write_str("]")
            }
            Self::Convert { inner, .. } => write!(f, "{inner}"),
        }
    }
}

/// Write an index argument the way the parser reads it back.
pub(crate) fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    if let Some(text) = value.downcast_ref::<String>() {
        f.write_str("\"")?;
        for c in text.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                c => write!(f, "{c}")?,
            }
        }
        f.write_str("\"")
    } else if let Some(n) = value.downcast_ref::<i64>() {
        write!(f, "{n}")
    } else if let Some(b) = value.downcast_ref::<bool>() {
        write!(f, "{b}")
    } else {
        write!(f, "{value:?}")
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn error(&self, reason: impl Into<String>) -> BindError {
        BindError::invalid_path(self.text, reason)
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, want: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(self.error(format!(
                "expected `{want}`, found `{c}` at {}",
                self.pos - c.len_utf8()
            ))),
            None => Err(self.error(format!("expected `{want}`, found end of input"))),
        }
    }

    fn parse(mut self, root: PathExpr) -> Result<PathExpr> {
        let mut expr = root;
        self.skip_ws();
        if self.peek().is_none() {
            return Ok(expr);
        }
        let mut first = true;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('[') => expr = self.indexer(expr)?,
                Some(c) if first && is_ident_start(c) => expr = expr.member(self.ident()?),
                Some('.') if !first => {
                    self.bump();
                    self.skip_ws();
                    expr = expr.member(self.ident()?);
                }
                Some(c) => {
                    return Err(self.error(format!("unexpected `{c}` at {}", self.pos)));
                }
                None => return Ok(expr),
            }
            first = false;
        }
    }

    fn ident(&mut self) -> Result<&'a str> {
        let start = self.pos;
        match self.peek() {
            Some(c) if is_ident_start(c) => {
                self.bump();
            }
            Some(c) => return Err(self.error(format!("expected a member name, found `{c}`"))),
            None => return Err(self.error("expected a member name, found end of input")),
        }
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        Ok(&self.text[start..self.pos])
    }

    fn indexer(&mut self, parent: PathExpr) -> Result<PathExpr> {
        self.expect('[')?;
        let mut args = Vec::new();
        loop {
            self.skip_ws();
            args.push(self.literal()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(']') => break,
                Some(c) => return Err(self.error(format!("expected `,` or `]`, found `{c}`"))),
                None => return Err(self.error("unterminated indexer")),
            }
        }
        Ok(parent.index(args))
    }

    fn literal(&mut self) -> Result<Value> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let mut out = String::new();
                loop {
                    match self.bump() {
                        Some('\\') => match self.bump() {
                            Some(c) => out.push(c),
                            None => return Err(self.error("unterminated string literal")),
                        },
                        Some(c) if c == quote => return Ok(Value::new(out)),
                        Some(c) => out.push(c),
                        None => return Err(self.error("unterminated string literal")),
                    }
                }
            }
            Some(c) if c == '-' || c.is_ascii_digit() => {
                let start = self.pos;
                self.bump();
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
                let digits = &self.text[start..self.pos];
                digits
                    .parse::<i64>()
                    .map(Value::new)
                    .map_err(|err| self.error(format!("bad integer `{digits}`: {err}")))
            }
            Some(c) if is_ident_start(c) => match self.ident()? {
                "true" => Ok(Value::new(true)),
                "false" => Ok(Value::new(false)),
                other => Err(self.error(format!(
                    "indexer arguments must be literals, found `{other}`"
                ))),
            },
            Some(c) => Err(self.error(format!("expected a literal, found `{c}`"))),
            None => Err(self.error("expected a literal, found end of input")),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}
