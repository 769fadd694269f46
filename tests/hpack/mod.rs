//! HPACK wrapper tests

mod encoding;
