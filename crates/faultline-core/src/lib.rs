//! faultline core library: ranks the files and symbols of a repository
//! checkout by how likely they are to need a change for a given issue.
//!
//! The pipeline is lexical retrieval (BM25 over keyword tokens), symbol
//! extraction on the top candidates, a textual reference graph scored with
//! PageRank, and a weighted fusion of the three signals. An optional LLM
//! rerank and an offline evaluation harness sit on top. With the `python`
//! feature the crate also builds as the `_faultline_core` extension module.

pub mod config;
pub mod errors;
pub mod eval;
pub mod indexer;
pub mod models;
pub mod pipeline;
pub mod query;

#[cfg(feature = "python")]
mod python;

pub use config::{LlmConfig, LocalizeConfig};
pub use errors::{FaultlineError, FaultlineResult};
pub use models::{LocalizeRequest, RankingResult};
pub use pipeline::localize;
