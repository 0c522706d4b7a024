pub mod auth;
pub mod chat;
pub mod error;
pub mod matches;
pub mod middleware;
pub mod notifications;
