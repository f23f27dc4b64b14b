//! These models represent the objects passed between the communicator and the LLM
//!
//! The conversation is a flat list of [`message::Message`] values with a uniform field set.
//! Provider implementations convert to and from their own wire format at the edge.
pub mod message;
pub mod tool;
