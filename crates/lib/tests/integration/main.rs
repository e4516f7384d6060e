mod common;
mod rebuild_tests;
