//! Path reconstruction for journal records
//!
//! The ancestor map comes from an external MFT walk restricted to the FRNs a
//! batch references; the resolver turns (parent FRN, leaf name) pairs into
//! absolute paths against it.

pub mod ancestry;
pub mod resolver;

pub use ancestry::{is_root_frn, AncestorMap, ROOT_FRN};
pub use resolver::{
    join_path, ClimbFailure, PathOrigin, PathResolver, ResolveSummary, DEFAULT_MAX_CLIMB_DEPTH,
    UNKNOWN_PARENT_DIR,
};
