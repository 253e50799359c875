#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use crate::reflect::MemberInfo;
use crate::value::{TypeInfo, Value};

/// Where a resolved path starts.
#[derive(Clone, Debug)]
pub enum PathRoot {
    /// The object handed to the binder call.
    Parameter(TypeInfo),
    /// A fixed object captured in the path.
    Constant(Value),
}

/// One resolved member access.
#[derive(Clone)]
pub struct PathSegment {
    member: Arc<MemberInfo>,
    args: Arc<[Value]>,
    declared_type: TypeInfo,
}

impl PathSegment {
    pub(crate) fn new(member: Arc<MemberInfo>, args: Vec<Value>, declared_type: TypeInfo) -> Self {
        Self {
            member,
            args: args.into(),
            declared_type,
        }
    }

    #[must_use]
    pub fn member(&self) -> &Arc<MemberInfo> {
        &self.member
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.member.name()
    }

    /// Constant indexer arguments; empty for plain members.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Declared type of the value this segment yields.
    #[must_use]
    pub fn value_type(&self) -> TypeInfo {
        self.declared_type
    }

    /// Name raised by the owner when this segment's value changes.
    #[must_use]
    pub fn notification_name(&self) -> String {
        self.member.notification_name()
    }
}

impl fmt::Debug for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathSegment")
            .field("member", &self.member.name())
            .field("args", &self.args)
            .field("type", &self.declared_type)
            .finish()
    }
}

/// An immutable, resolved member chain.
///
/// Cloning is cheap: segments are shared. [`parent`](PropertyPath::parent)
/// returns a view over the same segments, which is how each segment
/// reaches its parent.
#[derive(Clone)]
pub struct PropertyPath {
    root: PathRoot,
    root_type: TypeInfo,
    segments: Arc<[PathSegment]>,
    len: usize,
}

impl PropertyPath {
    pub(crate) fn new(root: PathRoot, root_type: TypeInfo, segments: Vec<PathSegment>) -> Self {
        let len = segments.len();
        Self {
            root,
            root_type,
            segments: segments.into(),
            len,
        }
    }

    #[must_use]
    pub fn root(&self) -> &PathRoot {
        &self.root
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments[..self.len]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// A path with no segments denotes the root itself.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.segments().last()
    }

    /// The path without its last segment.
    #[must_use]
    pub fn parent(&self) -> Option<PropertyPath> {
        (self.len > 0).then(|| Self {
            root: self.root.clone(),
            root_type: self.root_type,
            segments: Arc::clone(&self.segments),
            len: self.len - 1,
        })
    }

    /// Segments leading to the object that owns the last member.
    #[must_use]
    pub fn host_chain(&self) -> &[PathSegment] {
        &self.segments()[..self.len.saturating_sub(1)]
    }

    /// Whether the last member hangs directly off the root.
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.len == 1
    }

    /// Declared type of the value the whole path yields.
    #[must_use]
    pub fn value_type(&self) -> TypeInfo {
        self.last().map_or(self.root_type, PathSegment::value_type)
    }

    /// The object the chain starts from, given the object bound to the
    /// parameter.
    #[must_use]
    pub fn root_object(&self, bound: &Value) -> Value {
        match &self.root {
            PathRoot::Parameter(_) => bound.clone(),
            PathRoot::Constant(value) => value.clone(),
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let PathRoot::Constant(value) = &self.root {
            write!(f, "{value:?}")?;
            if !self.is_empty() {
                f.write_str(".")?;
            }
        }
        for (i, segment) in self.segments().iter().enumerate() {
            if segment.member.is_indexer() {
                f.write_str("[")?;
                for (j, arg) in segment.args.iter().enumerate() {
                    if j > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Literal(arg))?;
                }
                f.write_str("]")?;
            } else {
                if i > 0 {
                    f.write_str(".")?;
                }
                f.write_str(segment.name())?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyPath({self})")
    }
}

struct Literal<'a>(&'a Value);

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        super::write_literal(f, self.0)
    }
}
