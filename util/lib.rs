/*!
This crate contains the pieces shared by every other crate in the workspace: the error type, the `Finite` float wrapper, and the tokenizer used for text fields.
*/

#![allow(clippy::tabs_in_doc_comments)]

pub mod error;
pub mod finite;
pub mod tokenizer;

pub use self::error::{Error, Result};
