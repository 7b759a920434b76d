//! Business logic services.
//!
//! Services contain core dispatch logic separated from HTTP handlers:
//! the Store data access layer, the unsubscribe policy gate, the template
//! renderer, the transport drivers, and the dispatch engine that ties them
//! together behind a worker pool.

pub mod dispatcher;
pub mod policy;
pub mod renderer;
pub mod store;
pub mod transports;
