//! HTTP surface for the recipe service: token auth, user accounts and
//! per-user recipes, tags and ingredients.

pub mod error;
pub mod extract;
pub mod health;
pub mod middleware;
pub mod rest;
pub mod routes;
pub mod server;
pub mod state;

pub use error::*;
pub use routes::*;
pub use server::*;
pub use state::*;
