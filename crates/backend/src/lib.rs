//! Numisma Backend - access to the hosted backend-as-a-service.
//!
//! The hosted platform provides authentication, relational storage and file
//! storage. This crate is the only place that knows how to talk to it:
//!
//! - [`client`] - the single configured client handle (base URL + API key)
//! - [`query`] - table-scoped query builder (`select`/`insert`/`update`/`delete`)
//! - [`auth`] - email/password, phone OTP and OAuth (PKCE) sign-in
//! - [`storage`] - image uploads to storage buckets
//! - [`repository`] - one trait per entity, bound to the REST API
//! - [`memory`] - in-process bindings of the same traits for tests and local runs
//!
//! Application crates depend on the traits, never on the REST types, so the
//! backend can be swapped by building a different [`repository::Repositories`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod query;
pub mod repository;
pub mod storage;

pub use auth::{
    AuthApiError, AuthClient, AuthProvider, AuthSession, AuthUser, OAuthProvider, Pkce, SignUp,
};
pub use client::BackendClient;
pub use config::{BackendConfig, ConfigError};
pub use error::BackendError;
pub use memory::{InMemoryAuth, InMemoryBackend, InMemoryStorage};
pub use repository::{Repositories, RepositoryError};
pub use storage::{ObjectStorage, StorageClient};
