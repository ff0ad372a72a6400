//! Operator graph
//!
//! - [`op`]: operator kinds and the definition builder
//! - [`net`]: issuing definitions against a named workspace

pub mod net;
pub mod op;

pub use net::{Blob, Net};
pub use op::{OpDefBuilder, OpKind, OperatorDef};
