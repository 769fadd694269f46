//! HTTP/1.1 decoding through a full connection

#[path = "../support/mod.rs"]
mod support;

mod bodies;
mod errors;
mod messages;
