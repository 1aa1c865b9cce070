//! # Streamslots
//!
//! A Telegram bot for resellers of streaming-service profiles. It tracks
//! which accounts still have free profiles, who holds each one and when
//! every subscription is due for renewal.

pub mod bot;
pub mod commands;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod health;
pub mod localization;
pub mod model;
pub mod renewals;
