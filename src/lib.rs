//! Coverage reconciliation for code review builds.
//!
//! Reports in the Cobertura and JaCoCo XML dialects are parsed, mapped onto
//! the files touched by a change, merged, and summarised as percentage
//! metrics. Those metrics are compared with the baseline coverage of the
//! parent commit to decide whether the build passes.

pub mod aggregate;
pub mod baseline;
pub mod compare;
pub mod detect;
pub mod encode;
pub mod error;
pub mod model;
pub mod parsers;
pub mod resolve;
pub mod verdict;

pub use aggregate::{aggregate, Aggregator, CoverageReport};
pub use compare::{compare, compare_on_branch, CoverageCheckSettings, CoverageVerdict};
pub use error::{CovgateError, Result};
pub use model::{CodeCoverageMetrics, Counter, Counters, LineHits};
pub use resolve::PathResolver;
