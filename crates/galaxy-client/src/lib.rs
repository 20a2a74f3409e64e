//! Client for the Galaxy workflow platform
//!
//! [`GalaxyClient`] wraps the Galaxy HTTP API: histories, datasets, jobs,
//! tools, workflows and invocations. Calls go through the
//! [`galaxy_fetch`] pipeline, so they share its retry, timeout and decoding
//! behaviour.
//!
//! ```no_run
//! use galaxy_client::{GalaxyClient, Settings};
//!
//! async fn example() -> Result<(), galaxy_client::Error> {
//!     let settings = Settings::new(None::<&str>)?.from_env();
//!     let client = GalaxyClient::from_settings(&settings)?;
//!     let version = client.version().await?;
//!     println!("Galaxy {}", version.version_major);
//!     let histories: serde_json::Value = client.histories().await?;
//!     println!("{histories}");
//!     Ok(())
//! }
//! ```

mod client;
pub mod config;
pub mod env_vars;
mod error;
mod resources;
pub mod types;

pub use client::GalaxyClient;
pub use config::Settings;
pub use error::Error;
pub use galaxy_fetch;
pub use types::GalaxyVersion;
