//! Integration tests for composed resilience policies
