//! # Directory client
//!
//! Client for the Google Workspace Admin SDK Directory API, limited to the
//! records a primary domain migration touches: the customer, users, groups
//! and their aliases.
//!
//! ## Features
//!
//! - **Directory contract**: [`DirectoryClient`], an async trait with an
//!   HTTPS implementation ([`GoogleDirectory`]) and an in-memory one
//!   ([`InMemoryDirectory`]) that records calls
//! - **Authentication**: OAuth2 installed-application flow with a token
//!   cached on disk and automatic refresh
//! - **Resilience**: retries with exponential backoff on 429/5xx, one token
//!   refresh on 401
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cpd_directory::{Client, ClientConfig, DirectoryClient, GoogleDirectory, StaticToken};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(ClientConfig::default(), Arc::new(StaticToken::new("ya29...")))?;
//!     let directory = GoogleDirectory::new(client);
//!
//!     let customer = directory.get_customer("my_customer").await?;
//!     println!("Primary domain: {}", customer.primary_domain);
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod directory;
pub mod dto;
pub mod error;
pub mod memory;
pub mod token_cache;

// Re-export main types
pub use auth::{ClientSecret, InstalledAppFlow, StaticToken, Token, TokenManager, TokenSource};
pub use client::Client;
pub use config::ClientConfig;
pub use directory::{DirectoryClient, GoogleDirectory, ListQuery, Page};
pub use dto::{AliasConfirmation, CustomerPatch};
pub use error::{Error, Result};
pub use memory::{DirectoryCall, InMemoryDirectory, MY_CUSTOMER};
pub use token_cache::TokenCache;
