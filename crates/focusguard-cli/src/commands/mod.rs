pub mod config;
pub mod daemon;
pub mod rules;
pub mod settings;
pub mod sites;
pub mod sound;
pub mod stats;
pub mod task;
pub mod timer;
