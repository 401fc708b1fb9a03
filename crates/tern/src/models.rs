//! Canonical representations of everything exchanged with a model backend.
//!
//! Several overlapping wire formats flow through this crate: OpenAI-style
//! chat messages, the OpenAI responses item list, Anthropic content blocks,
//! and Gemini content parts. Each adapter converts between its backend's
//! shape and these internal structs at its own boundary, so nothing outside
//! a provider module ever handles a provider-specific payload. The internal
//! models deliberately do not match any single backend exactly.

pub mod content;
pub mod message;
pub mod role;
pub mod tool;
