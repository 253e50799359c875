#![forbid(unsafe_code)]

//! Set-then-get application of candidate values to a target path.
//!
//! For every candidate the compiler reads the target's current value,
//! compares, writes only on a difference and then reads the value back.
//! The read-back is what downstream observers see, so a setter that
//! coerces (clamps, rounds, normalizes) propagates the coerced value.
//!
//! # Host chains
//!
//! When the target member is reached through intermediate members, the
//! compiler also watches the host chain. A new host (by reference) gets
//! the last candidate replayed onto it when either:
//!
//! - no link of the host chain is the view-model member (see
//!   [`EngineConfig::view_model_member`](crate::EngineConfig)), or
//! - the new host's property currently holds its type's default.
//!
//! Candidates are always applied to the host found by re-reading the chain
//! from the root at that moment.
//!
//! # Failure Modes
//!
//! | Failure | When | Effect |
//! |---------|------|--------|
//! | target has no getter | build | `InvalidOperation` returned |
//! | target is read-only | build | `AccessorNotFound` returned |
//! | setter/getter error | per value | logged, sent to the error channel, stream ends |

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::accessor::{AccessorCache, Getter, Setter};
use crate::convert::ConverterService;
use crate::error::{AccessorKind, BindError, Result};
use crate::observe::ObservationService;
use crate::path::{PathSegment, PropertyPath};
use crate::reactive::Stream;
use crate::value::Value;

/// Result of applying one candidate value.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOutcome {
    /// Whether a write happened.
    pub emitted: bool,
    /// The value read back after the write, or the unchanged current value.
    pub value: Value,
}

/// Target member accessors, compiled once per binding.
#[derive(Clone)]
struct TargetMember {
    segment: PathSegment,
    getter: Arc<Getter>,
    setter: Arc<Setter>,
}

#[derive(Clone)]
enum Signal {
    Host(Value),
    Candidate(Value),
}

#[derive(Default)]
struct ChainState {
    host: Option<Value>,
    last_candidate: Option<Value>,
}

/// Builds set-then-get streams for target paths.
#[derive(Clone)]
pub struct BindingExpressionCompiler {
    accessors: Arc<AccessorCache>,
    converters: ConverterService,
    observation: ObservationService,
    view_model_member: Arc<str>,
}

impl BindingExpressionCompiler {
    #[must_use]
    pub fn new(
        accessors: Arc<AccessorCache>,
        converters: ConverterService,
        observation: ObservationService,
        view_model_member: &str,
    ) -> Self {
        Self {
            accessors,
            converters,
            observation,
            view_model_member: Arc::from(view_model_member),
        }
    }

    fn target_member(&self, path: &PropertyPath) -> Result<TargetMember> {
        let segment = path
            .last()
            .cloned()
            .ok_or_else(|| BindError::invalid_path(path, "target path must name a member"))?;
        let getter = self
            .accessors
            .getter_for(segment.member())
            .map_err(|err| match err {
                BindError::AccessorNotFound {
                    owner,
                    member,
                    kind: AccessorKind::Getter,
                } => BindError::InvalidOperation(format!(
                    "target `{owner}.{member}` has no public getter"
                )),
                other => other,
            })?;
        let setter = self.accessors.setter_for(segment.member())?;
        Ok(TargetMember {
            segment,
            getter,
            setter,
        })
    }

    /// Apply `candidate` to `segment` on `host`: compare, write on a
    /// difference, read back.
    pub fn set_then_get(
        &self,
        host: &Value,
        segment: &PathSegment,
        candidate: &Value,
    ) -> Result<SetOutcome> {
        let getter = self.accessors.getter_for(segment.member())?;
        let setter = self.accessors.setter_for(segment.member())?;
        self.apply(
            &TargetMember {
                segment: segment.clone(),
                getter,
                setter,
            },
            host,
            candidate,
        )
    }

    fn apply(&self, target: &TargetMember, host: &Value, candidate: &Value) -> Result<SetOutcome> {
        let args = target.segment.args();
        let current = target.getter.get(host, args)?;
        let to_write = match self
            .converters
            .resolve_set_method_converter(candidate.type_info(), Some(target.segment.value_type()))
        {
            Some(converter) => converter.perform_set(&current, candidate, args),
            None => candidate.clone(),
        };
        if to_write == current {
            return Ok(SetOutcome {
                emitted: false,
                value: current,
            });
        }
        target.setter.set(host, to_write, args)?;
        let value = target.getter.get(host, args)?;
        Ok(SetOutcome {
            emitted: true,
            value,
        })
    }

    fn apply_logged(
        &self,
        target: &TargetMember,
        path: &PropertyPath,
        host: &Value,
        candidate: &Value,
    ) -> Result<Option<Value>> {
        match self.apply(target, host, candidate) {
            Ok(outcome) => Ok(outcome.emitted.then_some(outcome.value)),
            Err(error) => {
                tracing::error!(path = %path, %error, "failed to apply bound value");
                Err(error)
            }
        }
    }

    /// Apply every value of `candidates` to `target_path` on `target`.
    ///
    /// The returned stream emits the read-back value of each write that
    /// actually happened. Fails immediately when the target member cannot
    /// be read or written.
    pub fn bind_to_direct(
        &self,
        target: &Value,
        target_path: &PropertyPath,
        candidates: Stream<Value>,
    ) -> Result<Stream<Value>> {
        let member = self.target_member(target_path)?;
        let root = target_path.root_object(target);
        if target_path.is_direct() {
            Ok(self.direct(member, target_path.clone(), root, candidates))
        } else {
            Ok(self.chained(member, target_path.clone(), root, candidates))
        }
    }

    fn direct(
        &self,
        member: TargetMember,
        path: PropertyPath,
        host: Value,
        candidates: Stream<Value>,
    ) -> Stream<Value> {
        let compiler = self.clone();
        candidates.synchronize().try_filter_map(move |candidate| {
            compiler.apply_logged(&member, &path, &host, &candidate)
        })
    }

    fn chained(
        &self,
        member: TargetMember,
        path: PropertyPath,
        root: Value,
        candidates: Stream<Value>,
    ) -> Stream<Value> {
        // `parent()` is always `Some` here: chained paths have at least two
        // segments.
        let host_path = path.parent().unwrap_or_else(|| path.clone());
        let replay_on_host_change = !host_path
            .segments()
            .iter()
            .any(|segment| segment.name() == &*self.view_model_member);

        let host_changes = self.observation.when_any_value(&root, &host_path);
        let merged = Stream::merge(vec![
            host_changes.map(Signal::Host),
            candidates.map(Signal::Candidate),
        ])
        .synchronize();

        let compiler = self.clone();
        Stream::defer(move || {
            let state = Arc::new(Mutex::new(ChainState::default()));
            let compiler = compiler.clone();
            let member = member.clone();
            let path = path.clone();
            let host_path = host_path.clone();
            let root = root.clone();
            merged.try_filter_map(move |signal| match signal {
                Signal::Host(host) => {
                    let replay = {
                        let mut state = state.lock();
                        if state.host.as_ref().is_some_and(|prev| prev.same_ref(&host)) {
                            return Ok(None);
                        }
                        state.host = Some(host.clone());
                        state.last_candidate.clone()
                    };
                    let Some(last) = replay else {
                        return Ok(None);
                    };
                    if host.is_null() {
                        return Ok(None);
                    }
                    let at_default = || -> Result<bool> {
                        let current = member.getter.get(&host, member.segment.args())?;
                        Ok(current == member.segment.value_type().default_value())
                    };
                    if replay_on_host_change || at_default()? {
                        compiler.apply_logged(&member, &path, &host, &last)
                    } else {
                        Ok(None)
                    }
                }
                Signal::Candidate(candidate) => {
                    state.lock().last_candidate = Some(candidate.clone());
                    match compiler.accessors.get_value(&root, &host_path)? {
                        Some(host) if !host.is_null() => {
                            compiler.apply_logged(&member, &path, &host, &candidate)
                        }
                        _ => Ok(None),
                    }
                }
            })
        })
    }
}

impl fmt::Debug for BindingExpressionCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingExpressionCompiler")
            .field("view_model_member", &self.view_model_member)
            .finish()
    }
}
