//! Argus eval — symbolic evaluator over scanned Go packages.
//!
//! The evaluator walks function bodies from the scan crate's entity
//! model without executing anything: every value is an [`Object`],
//! unknown values are placeholders that carry static type information,
//! and host tools observe the walk through intrinsics (most usefully
//! the default intrinsic, which sees every call).

pub mod env;
pub mod evaluator;
pub mod intrinsics;
pub mod object;
pub mod stack;

pub use env::Env;
pub use evaluator::{Evaluator, FileCtx, DEFAULT_MAX_CALL_DEPTH};
pub use intrinsics::IntrinsicRegistry;
pub use object::{
    ErrorObj, FunctionObj, InstanceObj, IntrinsicFn, Object, PackageObj, PlaceholderObj,
    PointerObj, SliceObj, TypeObj, VariableObj,
};
pub use stack::{CallStack, Frame, FrameSnapshot};
