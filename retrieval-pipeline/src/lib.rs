#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod answer;
pub mod config;
pub mod context;
pub mod post_process;
pub mod prompt;
pub mod retriever;

pub use answer::{AnswerMeta, AnswerRequest, AnswerResponse, AnswerService};
pub use config::RetrievalTuning;
pub use prompt::{AssistanceLevel, InteractionMode};
pub use retriever::{RetrievalMethod, Retriever};
