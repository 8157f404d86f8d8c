//! TUI components

pub mod chat;
pub mod gallery;
pub mod sidebar;
