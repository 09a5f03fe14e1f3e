//! Signal-routing graph construction and parameter algebra.
//!
//! This crate is the patch-authoring layer of modwire: it declares blocks
//! with named, width-typed parameters, lets callers combine parameter
//! references with ordinary `+`/`*` arithmetic, and resolves those
//! expressions into concrete wires — auto-inserting fixed-capacity mixers
//! where a sum needs one — through the `GraphRegistry`, which owns the
//! engine handle and the authoritative block/wire bookkeeping.

pub mod block;
pub mod expr;
pub mod registry;
pub mod resolve;
pub mod schema;
pub mod slots;

pub use block::{Block, BlockKind};
pub use expr::{AddedParams, AttachedParam, MultipliedParams, ParamExpr, ScaledParam};
pub use registry::{Connection, Endpoint, GraphRegistry, MixDown, Wire, WriteValue};
pub use resolve::{WireTarget, resolve};
pub use schema::{BlockSchema, Param};
pub use slots::Occupancy;
