// Library interface for compass.
// The binary in main.rs is a thin CLI over these modules.

pub mod config;
pub mod filter;
pub mod inventory;
pub mod logging;
pub mod priority;
pub mod search;

#[cfg(test)]
mod test_utils;
