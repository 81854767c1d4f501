//! inbox-sweeper: unsubscribe resolution pipeline.
//!
//! Finds an unsubscribe mechanism for an email (List-Unsubscribe header or
//! an AI-discovered link), works through HTTP and browser strategies until
//! one is judged successful, and records the outcome.

pub mod browser;
pub mod config;
pub mod error;
pub mod extract;
pub mod jobs;
pub mod llm;
pub mod mail;
pub mod oracle;
pub mod store;
pub mod unsubscribe;
