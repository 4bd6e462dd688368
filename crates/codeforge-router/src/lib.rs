//! Model routing with health tracking
//!
//! [`ModelRouter`] owns the only state shared between concurrent requests: the
//! health table of configured models. Selection reads it, outcome reports
//! write it, and no lock is held across a model call.

mod descriptor;
mod router;

pub use descriptor::{ModelDescriptor, ModelStatus, ModelUsage, Outcome};
pub use router::ModelRouter;
