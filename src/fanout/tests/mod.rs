//! Tests for the fan-out hub

mod lifecycle;
