/// Shared types for the msgr direct-messaging service.
///
/// `models` are the domain records the store hands out; `api` holds the
/// request and response bodies of the HTTP surface.
pub mod api;
pub mod models;
