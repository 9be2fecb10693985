//! Domain types
//!
//! Configuration records for every resource the deployment stack declares,
//! plus the record of a pipeline run. These types carry no behaviour beyond
//! construction and small accessors; the managed services do the work.

pub mod build;
pub mod distribution;
pub mod pipeline;
pub mod run;
pub mod source;
pub mod storage;
