//! End-to-end tests for the relying-party crates live under `tests/`.
