//! Shared test utilities for tide-db unit tests.
