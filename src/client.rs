//! Client-level configuration read from connection strings.

pub mod options;
