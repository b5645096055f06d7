//! Follow a YouTube video's transcript in the terminal, highlighting the line being spoken.

pub mod app;
pub mod config;
pub mod constants;
pub mod input;
pub mod logging;
pub mod model;
pub mod pacing;
pub mod player;
pub mod session;
pub mod sync;
pub mod theme;
pub mod transcript;
pub mod ui;
pub mod wait;
pub mod youtube;
