pub mod client;

pub use client::{ContextSnippet, RetrievalClient, RetrievalError, RetrievalResult};
