//! Variable-driven patch generation for CAPI ClusterClass topologies
//!
//! The engine answers DiscoverVariables, GeneratePatches, and
//! ValidateTopology for a set of feature mutators:
//!
//! - [`variables`] resolves typed values out of a cluster's variable bag
//! - [`selectors`] decides whether a templated object is in scope for a patch
//! - [`objects`] decodes untyped request objects into a closed set of template types
//! - [`mutation`] runs a typed mutate function and diffs the result into a JSON Patch
//! - [`handler`] groups mutators into a [`MetaHandler`] serving the hooks
//! - [`handlers`] holds the concrete feature mutators and meta handlers

#![deny(missing_docs)]

pub mod handler;
pub mod handlers;
pub mod mutation;
pub mod objects;
pub mod selectors;
pub mod variables;

pub use handler::{MetaHandler, MetaHandlerBuilder, Mutate, TypedMutator, VariableDefinition};
pub use mutation::{MutationContext, PatchSet};
pub use objects::{ObjectRegistry, TemplateKind, TemplateObject, TemplateType};
pub use variables::{VariableMap, VariableRef};
