#![forbid(unsafe_code)]

use std::sync::Arc;

use super::{PathExpr, PathRoot, PathSegment, PropertyPath};
use crate::error::{BindError, Result};
use crate::reflect::{INDEXER_NAME, TypeRegistry};
use crate::value::{Object, TypeInfo, Value, object_type};

enum Step {
    Member(Arc<str>),
    Index(Vec<Value>),
}

struct Flat {
    root: PathRoot,
    root_type: Option<TypeInfo>,
    steps: Vec<(Step, Option<TypeInfo>)>,
}

/// Turns a [`PathExpr`] into a [`PropertyPath`].
///
/// Resolution is pure: it only reads the type registry.
#[derive(Clone, Copy)]
pub struct PathResolver<'a> {
    types: &'a TypeRegistry,
}

impl<'a> PathResolver<'a> {
    #[must_use]
    pub fn new(types: &'a TypeRegistry) -> Self {
        Self { types }
    }

    /// Resolve `expr`: strip conversions, capture indexer arguments and
    /// look every member up in the registry.
    pub fn resolve(&self, expr: &PathExpr) -> Result<PropertyPath> {
        let flat = flatten(expr, expr)?;
        let untyped = TypeInfo::of::<dyn Object>();
        let root_type = match (&flat.root, flat.root_type) {
            (_, Some(cast)) => cast,
            (PathRoot::Parameter(info), None) => *info,
            (PathRoot::Constant(value), None) => match value {
                Value::Null => return Err(BindError::invalid_path(expr, "constant root is null")),
                Value::Data(_) => {
                    return Err(BindError::invalid_path(
                        expr,
                        "constant root must be an object",
                    ));
                }
                Value::Object(object) => object_type(object),
            },
        };

        let mut owner = root_type;
        let mut segments = Vec::with_capacity(flat.steps.len());
        for (step, cast) in flat.steps {
            let (name, args): (&str, Vec<Value>) = match &step {
                Step::Member(name) => (&**name, Vec::new()),
                Step::Index(args) => (INDEXER_NAME, args.clone()),
            };
            if owner == untyped {
                return Err(BindError::invalid_path(
                    expr,
                    format!("cannot resolve `{name}` on an untyped object; add a convert"),
                ));
            }
            let member = self.types.member(owner, name).ok_or_else(|| {
                BindError::invalid_path(expr, format!("`{owner}` has no member `{name}`"))
            })?;
            if member.arity() != args.len() {
                return Err(BindError::invalid_path(
                    expr,
                    format!(
                        "`{owner}.{name}` takes {} index argument(s), got {}",
                        member.arity(),
                        args.len()
                    ),
                ));
            }
            let declared = cast.unwrap_or_else(|| member.value_type());
            segments.push(PathSegment::new(member, args, declared));
            owner = declared;
        }
        Ok(PropertyPath::new(flat.root, root_type, segments))
    }

    /// Resolve and check that a parameter root matches the bound object.
    pub fn resolve_for(&self, expr: &PathExpr, bound: &Value) -> Result<PropertyPath> {
        let path = self.resolve(expr)?;
        if let PathRoot::Parameter(expected) = path.root() {
            let untyped = TypeInfo::of::<dyn Object>();
            match bound.type_info() {
                Some(actual) if *expected != untyped && actual != *expected => {
                    return Err(BindError::invalid_path(
                        &path,
                        format!("path is rooted at `{expected}` but bound to `{actual}`"),
                    ));
                }
                _ => {}
            }
        }
        Ok(path)
    }
}

fn strip(expr: &PathExpr) -> &PathExpr {
    match expr {
        PathExpr::Convert { inner, .. } => strip(inner),
        other => other,
    }
}

fn flatten(whole: &PathExpr, expr: &PathExpr) -> Result<Flat> {
    match expr {
        PathExpr::Parameter(info) => Ok(Flat {
            root: PathRoot::Parameter(*info),
            root_type: None,
            steps: Vec::new(),
        }),
        PathExpr::Constant(value) => Ok(Flat {
            root: PathRoot::Constant(value.clone()),
            root_type: None,
            steps: Vec::new(),
        }),
        PathExpr::Member { parent, name } => {
            let mut flat = flatten(whole, parent)?;
            flat.steps.push((Step::Member(Arc::clone(name)), None));
            Ok(flat)
        }
        PathExpr::Index { parent, args } => {
            let mut flat = flatten(whole, parent)?;
            let args = args
                .iter()
                .map(|arg| match strip(arg) {
                    PathExpr::Constant(value) => Ok(value.clone()),
                    other => Err(BindError::invalid_path(
                        whole,
                        format!("indexer argument `{other}` is not a constant"),
                    )),
                })
                .collect::<Result<Vec<_>>>()?;
            flat.steps.push((Step::Index(args), None));
            Ok(flat)
        }
        PathExpr::Convert { inner, to } => {
            let mut flat = flatten(whole, inner)?;
            match flat.steps.last_mut() {
                Some((_, cast)) => *cast = Some(*to),
                None => flat.root_type = Some(*to),
            }
            Ok(flat)
        }
    }
}
