//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules for better organization:
//! - `message_handler`: Routes incoming text to commands, menu entries and the wizard
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `command_handler`: Runs parsed commands against the store
//! - `ui_builder`: Creates keyboards and formats messages
//! - `dialogue_manager`: Drives the new-customer wizard

pub mod callback_handler;
pub mod command_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

// Re-export utility functions that might be used elsewhere
pub use command_handler::execute_command;
pub use ui_builder::{split_message, Reply};
