//! Highlight-and-annotate core of coursediff.
//!
//! The front end owns a [`session::CompareSession`], a [`document::Document`]
//! (the two rendered panels), an [`cache::AnnotationCache`] and a
//! [`coordinator::SubmissionCoordinator`], and passes them by reference into
//! the functions of this crate. Data access goes through [`api::ReviewApi`].

pub mod api;
pub mod cache;
pub mod coordinator;
pub mod db;
pub mod document;
pub mod error;
pub mod highlight;
pub mod highlighter;
pub mod history;
pub mod schema;
pub mod session;
pub mod thread;
pub mod types;

pub use error::{CoreError, Result};
