pub mod backend;
pub mod commands;
pub mod config;
pub mod doctor;
pub mod error;
pub mod fs_utils;
pub mod keyname;
pub mod paths;
pub mod profile;
pub mod runner;
pub mod state;
pub mod store;
pub mod switch;
pub mod ui;
pub mod vault;

#[cfg(test)]
pub mod test_utils;
