pub mod auth;
pub mod cookies;
pub mod errors;
pub mod oauth;
pub mod routes;
pub mod server;
pub mod session;
pub mod setup;
pub mod state;
pub mod user;
