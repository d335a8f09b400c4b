//! Core building blocks for command-line applications that talk to REST
//! services.
//!
//! The crate provides three cooperating pieces:
//!
//! - [`session`]: connection descriptors (host, protocol, credentials,
//!   timeouts), validated at build time, with zeroize-on-drop secret storage;
//! - [`client`]: a streaming REST client built around a per-request
//!   [`client::RestEngine`] handling authentication, proxies, compression and
//!   newline normalization, with the [`client::RestClient`] verb façade over
//!   it;
//! - [`censor`]: credential censorship for logs, console output and
//!   diagnostics, driven by profile schemas and the active configuration.
//!
//! # Example
//!
//! ```no_run
//! use cadre_core::client::RestClient;
//! use cadre_core::session::{AuthType, Session};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::builder()
//!     .hostname("services.example.com")
//!     .auth_type(AuthType::Basic)
//!     .user("user")
//!     .password("password")
//!     .build()?;
//!
//! let body = RestClient::get_expect_string(&mut session, "/api/v1/items", vec![]).await?;
//! println!("{body}");
//! # Ok(())
//! # }
//! ```

pub mod censor;
pub mod client;
pub mod env;
pub mod session;

pub use censor::{CENSOR_RESPONSE, Censor, CensorOptions};
pub use client::{
    ProgressTask, RestClient, RestClientError, RestEngine, RestFailure, RestRequest, WriteData,
};
pub use session::{AuthType, Protocol, SecretString, Session, SessionError};
