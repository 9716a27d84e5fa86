//! Document ingestion: folder loading, domain tagging and the
//! load → chunk → embed → index pipeline.

pub mod domain;
pub mod loader;
pub mod pipeline;
