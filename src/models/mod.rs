//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables.

/// Recipient model
pub mod contact;
/// Delivery result and delivery log models
pub mod delivery;
/// Notification unit-of-work model, channel and priority enums
pub mod notification;
/// Tenant identity model
pub mod profile;
/// Message template model
pub mod template;
