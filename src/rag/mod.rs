//! Retrieval-augmented answering: role routing, similarity search, relevance
//! filtering and grounded generation.

pub mod pipeline;
pub mod routing;
