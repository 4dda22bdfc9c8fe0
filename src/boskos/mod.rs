//! Boskos project leasing

mod client;
mod holder;

pub use client::{BoskosClient, BoskosError};
pub use holder::{HolderConfig, ProjectHolder, DEFAULT_BOSKOS_URL};
