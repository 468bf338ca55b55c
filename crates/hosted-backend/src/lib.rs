//! Client for a hosted backend made of a PostgREST record store and a GoTrue
//! email identity provider.
//!
//! The crate only speaks the wire protocol. Session bookkeeping, caching and
//! domain rules live in the application crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use hosted_backend::{BackendConfig, Client};
//!
//! #[derive(serde::Deserialize)]
//! struct Goal {
//!     position: u8,
//!     title: String,
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(BackendConfig {
//!     url: "https://project.supabase.co".into(),
//!     anon_key: "public-anon-key".into(),
//!     ..Default::default()
//! })?;
//!
//! let session = client.auth().verify_otp("me@example.com", "123456").await?;
//!
//! let goals: Vec<Goal> = client
//!     .from("goals")
//!     .auth(&session.access_token)
//!     .select("*")
//!     .eq("user_id", &session.user.id)
//!     .order("position", true)
//!     .execute()
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod error;
mod query;
mod types;

pub use auth::AuthApi;
pub use client::Client;
pub use error::BackendError;
pub use query::QueryBuilder;
pub use types::*;
