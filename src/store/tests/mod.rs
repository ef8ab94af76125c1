//! Tests for the in-memory durable store
