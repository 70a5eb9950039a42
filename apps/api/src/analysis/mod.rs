//! Resume analysis pipeline.
//!
//! Preprocess → structure stage → validate → appeal stage → validate → aggregate.
//! Each stage attempt is one bounded model call through a `ModelGateway`;
//! `orchestrator::AnalysisEngine` sequences them and owns retry and cancellation.

pub mod aggregator;
pub mod appeal;
pub mod confidence;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod industry;
pub mod models;
pub mod orchestrator;
pub mod parsing;
pub mod preprocess;
pub mod prompts;
pub mod retry;
pub mod structure;
pub mod validator;

#[cfg(test)]
pub mod testing;
