//! File indexing for include resolution.
//!
//! - [`glob`] - restricted glob translation
//! - [`filter`] - `include:`/`exclude:` path filters
//! - [`trie`] - suffix trie answering "which directories contain this header"

pub mod filter;
pub mod glob;
pub mod trie;

pub use filter::{FilterError, PathFilter};
pub use glob::GlobMatcher;
pub use trie::SuffixTrie;
