//! # Chain Samples
//!
//! Ready-made chains composed from [`ChainExecutor`](crate::chain::ChainExecutor):
//! * [Adaptive complexity routing](adaptive::AdaptiveComplexityChain)
//! * [Content creation pipeline](content_pipeline::ContentPipeline)
//! * [Self-consistency voting](self_consistency::SelfConsistency)

pub mod adaptive;
pub mod content_pipeline;
pub mod self_consistency;
