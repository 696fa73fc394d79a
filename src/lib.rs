//! Dunning Engine - Payment recovery automation
//!
//! Evaluates operator-defined rules against failed payments, drives each
//! affected subscription through a versioned workflow of retries,
//! notifications, waits and escalations, and guards every campaign with a
//! lease so that concurrent schedulers never act on it twice.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
