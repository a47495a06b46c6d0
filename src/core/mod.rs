//! Object model and commit engine.
//!
//! - [`ObjectHeader`] / [`SceneObject`]: identity, parameters, commit state
//! - [`ParameterSet`]: typed parameter storage
//! - [`DependencyGraph`]: observer edges between objects
//! - [`CommitBuffer`]: notified objects waiting for recommit
//! - [`DeviceContext`]: object factory and commit protocol
//! - [`Diagnostic`]: validation reporting

mod commit_buffer;
mod context;
mod deps;
mod diagnostics;
mod object;
mod params;

pub use commit_buffer::CommitBuffer;
pub use context::{CommitScope, DeviceContext};
pub use deps::DependencyGraph;
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, Severity, TracingSink};
pub use object::{CommitState, ObjectHeader, ObjectId, ObjectKind, SceneObject};
pub use params::{FromObjectRef, FromParam, ObjectRef, ParamValue, ParameterSet};
