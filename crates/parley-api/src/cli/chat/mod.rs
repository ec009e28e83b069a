//! Interactive CLI chat with the studio desk.
//!
//! This module implements the chat loop: quota-gated turns, a typing
//! spinner while a persona composes its reply, session slash commands and
//! attachment uploads. Entry point: `loop_runner::run_chat`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod renderer;
