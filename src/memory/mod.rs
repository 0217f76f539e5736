//! The conversational memory pipeline components.
//!
//! - [`persona`] resolves per-identity instructions with fallback.
//! - [`history`] reads bounded windows from the turn log and compacts them.
//! - [`summarizer`] turns a window into one summary paragraph.
//! - [`semantic`] stores and recalls long-term facts per identity.
//! - [`assembler`] orders everything into the prompt sent to the model.

pub mod assembler;
pub mod history;
pub mod persona;
pub mod semantic;
pub mod summarizer;
pub mod types;
