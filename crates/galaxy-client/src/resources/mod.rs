//! Galaxy API resources
//!
//! Each module adds the calls for one resource to [`GalaxyClient`](crate::GalaxyClient).
//! Results are generic so callers pick the shape they need.

mod datasets;
mod histories;
mod invocations;
mod jobs;
mod tools;
mod workflows;
