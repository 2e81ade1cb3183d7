//! Real-time chat infrastructure for document conversations.
//!
//! This crate keeps track of who is connected to which conversation and
//! routes typed chat events to them. It is transport-agnostic: each
//! connection is represented by a channel sender of serialized JSON frames,
//! and whatever owns the socket drains the receiving end.
//!
//! # Architecture
//!
//! - **Multiple connections per user**: a user may have several tabs open,
//!   each registered separately.
//! - **Indexed registry**: connections are indexed by user and by the
//!   conversation they are open on, both in `DashMap`s so registration,
//!   removal and routing can happen concurrently from different tasks.
//! - **Connection, User and Conversation scopes**: events go to a single
//!   connection, to every connection of one user, or to every connection
//!   open on a conversation.
//! - **Ephemeral events**: offline users miss events and read the persisted
//!   history on their next connect.
//! - **Self-healing**: a send to a closed channel removes that connection.
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry and the type-safe ConnectionId
//! - `manager`: serializes events and routes them by scope
//! - `message`: outgoing events, incoming client messages and scopes

pub mod connection;
pub mod manager;
pub mod message;

pub use manager::Manager;
