//! HTTP handlers of the gateway. Each one validates its input, forwards it to
//! the owning gRPC service and reshapes the reply into the JSON the dashboard
//! and point of sale consume.

pub mod admin;
pub mod analytics;
pub mod cafes;
pub mod common;
pub mod inventory;
pub mod login;
pub mod menu;
pub mod orders;
