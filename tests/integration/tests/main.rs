//! End-to-end relying-party tests.
//!
//! Every flow runs against an in-process provider; no network access is
//! needed.

mod common;
mod facade;
mod flows;
