//! Purchasing domain module (purchase order lines and their sub-objects).
//!
//! This crate describes the shape of a composite purchase order line: which
//! sub-objects a line references, where each one lives in storage, how a
//! stored stub is taken apart before resolution and how adjustments across a
//! set of lines add up. Nothing here performs IO.

pub mod adjustment;
pub mod line;
pub mod operation;
pub mod registry;

pub use adjustment::{Adjustment, AdjustmentSource, combine_adjustments};
pub use line::{
    CompositeLine, DetachedReferences, LineCollection, LineStub, ResolutionWarning,
    SubObjectCall, SubObjectRef,
};
pub use operation::Operation;
pub use registry::{Cardinality, SubObjectKind};
