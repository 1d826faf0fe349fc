//! # Veles
//!
//! A client library for the Veles key/value pub-sub overlay:
//! publish, subscribe, query, and advertise presence over a single
//! persistent transport to a local broker.
//!
//! ## Components
//!
//! - `veles-protocol`: wire message definitions, binary codec, key
//!   expressions, and the transport abstraction
//! - `veles-client`: the session multiplexer, delivery channels, and
//!   the user-facing API types
//!
//! ## Example
//!
//! See the `veles-client` crate documentation for usage examples.

pub use veles_client as client;
pub use veles_protocol as protocol;
