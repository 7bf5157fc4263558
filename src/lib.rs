//! Translate the text columns of a dataset in parallel batches and publish
//! the augmented dataset to the Hugging Face Hub.
//!
//! Flow: source → [`batch::partition`] → [`dispatch::ParallelMap`] running
//! [`translation::ItemTranslator::translate_batch`] → [`aggregate::aggregate`]
//! → [`rewrite::rewrite`] → [`storage::save_to_disk`] → [`hub::HubClient::push_dataset`].

pub mod aggregate;
pub mod batch;
pub mod columns;
pub mod config;
pub mod dataset;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod pipeline;
pub mod rewrite;
pub mod source;
pub mod storage;
pub mod translation;

pub use columns::{ColumnKind, ColumnSet, ColumnSpec};
pub use dataset::Dataset;
pub use dispatch::{LocalDispatcher, ParallelMap};
pub use error::{DatasetError, DispatchError};
pub use rewrite::RewritePolicy;
pub use translation::{ItemTranslator, TextTranslator, Translation};
