//! Core primitives for building supervised services.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod runtime;
