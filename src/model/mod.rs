//! Core value types for patricia_db

mod hash;

pub use hash::Hash;
