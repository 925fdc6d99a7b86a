//! pattern-export library
//!
//! Job manifests, a directory-backed chip store and decode writers for the
//! `pattern-export` binary.

pub mod decode;
pub mod manifest;
pub mod store;
