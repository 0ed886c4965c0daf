//! Tests for the interpreter
//!
//! Organized by feature area

mod helpers;

mod function_tests;
mod literal_tests;
