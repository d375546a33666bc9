//! # Tronity API Adapter
//!
//! HTTP client for the Tronity platform.
//!
//! ## Endpoints
//!
//! - **Authentication**: `POST` form `client_id`, `client_secret`,
//!   `grant_type=app`; answers `{"access_token": ...}` with 200 or 201
//! - **Telemetry**: `GET {vehicles}/{id}/last_record` with a bearer token
//! - **Identity**: `GET {vehicles}/{id}`, answers `{"displayName": ...}`
//!
//! The [`VehicleApi`] trait is the seam the refresh coordinator is written
//! against; [`TronityClient`] is its network implementation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod client;
pub mod token;

pub use api::VehicleApi;
pub use client::{ClientError, TronityClient, TronityClientConfig};
pub use token::BearerToken;
