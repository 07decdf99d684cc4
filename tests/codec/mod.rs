//! Integration tests for the frame codec and connection context.

mod headers;
