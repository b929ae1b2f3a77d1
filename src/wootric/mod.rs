pub mod auth;
pub mod client;
pub mod entity;
pub mod paginator;
pub mod schema;
pub mod transform;
