//! Hierarchical template-token resolution.
//!
//! This module provides:
//! - A [`Context`] with ordered token bindings and resolver strategies
//! - Built-in resolvers for static values and run dates
//! - Parent chaining so a configuration context falls back to its task

mod resolver;
mod tokens;

pub use resolver::{Context, ResolverFn, TokenResolver};
pub use tokens::{DateTimeTokens, StaticTokens};
