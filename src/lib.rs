//! Start and stop time tracking entries from a multi-button deck and watch the elapsed time on
//! its status button. Project pages are written into the deck application's own configuration,
//! without disturbing anything else it stores there.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod deck;
pub mod fs;
pub mod registry;
pub mod render;
pub mod tracking;
pub mod utils;
