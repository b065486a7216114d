//! Normalise legacy escaped directory names into safe slugs and migrate
//! `prod` directory trees from the old naming scheme to the new one.

pub mod config;
pub mod discover;
pub mod escape;
pub mod fsops;
pub mod migrate;
pub mod scheme;
pub mod slug;
pub mod validity;
