//! Toolgate: model-driven tool invocation.
//!
//! A registry of validated, schema-described tools; a gateway that asks an
//! OpenAI-compatible model which tools to call (with an on-disk response
//! cache); and a dispatcher that runs the selected calls in order.

pub mod cache;
pub mod config;
pub mod deadline;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod runner;
pub mod tools;
pub mod types;
