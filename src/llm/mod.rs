//! Clients for the hosted embedding and chat-completion APIs.

pub mod chat;
pub mod embeddings;
