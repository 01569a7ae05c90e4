//! Client core for AWS-compatible cloud APIs.
//!
//! This crate covers the wire-level plumbing shared by every service
//! client: request canonicalization and signing, endpoint resolution per
//! provider variant, transmission with retry and redirect handling,
//! response decoding into a uniform body tree and marker pagination.
//!
//! ## Overview
//!
//! - **ProviderVariant**: which AWS-compatible cloud the client talks to;
//!   decides signing scheme, Authorization prefix and endpoint shape
//! - **RequestDescriptor**: one described call, built by a service client
//!   and handed to the invoker
//! - **Signer**: resolves the credential once and signs each request under
//!   the scheme its variant and service require (SigV4 or the legacy HMAC
//!   forms)
//! - **Invoker**: executes a descriptor end to end with transient-failure
//!   retry, single-redirect follow and typed error classification
//! - **Paginator**: drives marker-paginated listings to completion
//!
//! ## Example
//!
//! ```no_run
//! use cloudcall::{
//!     Config, Context, Invoker, ProviderVariant, ReqwestHttpSend, RequestDescriptor, Signer,
//!     StaticCredentialProvider,
//! };
//! use http::Method;
//!
//! #[tokio::main]
//! async fn main() -> cloudcall::Result<()> {
//!     let ctx = Context::new().with_http_send(ReqwestHttpSend::default());
//!     let config = Config::new(ProviderVariant::Aws).with_region("us-east-1");
//!     let signer = Signer::new(
//!         ctx.clone(),
//!         config.variant,
//!         StaticCredentialProvider::new("access_key_id", "secret_access_key"),
//!     );
//!     let invoker = Invoker::new(ctx, config, signer);
//!
//!     let desc = RequestDescriptor::new(Method::GET, "ec2")
//!         .with_param("Action", "DescribeRegions")
//!         .with_param("Version", "2014-06-15");
//!     let resp = invoker.invoke(&desc).await?;
//!     println!("status: {}", resp.status());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod cache;
mod classify;
mod config;
mod context;
mod credential;
mod error;
mod invoke;
mod paginate;
mod request;
mod response;
mod sign;
mod variant;

pub mod encode;
pub mod hash;
pub mod time;

pub use cache::MetadataCache;
pub use classify::classify;
pub use classify::error_from_response;
pub use config::Config;
pub use config::ENV_ENDPOINT;
pub use config::ENV_PROVIDER_VARIANT;
pub use config::ENV_REGION;
pub use context::Context;
pub use context::Env;
pub use context::HttpSend;
pub use context::NoopEnv;
pub use context::NoopHttpSend;
pub use context::OsEnv;
pub use context::ReqwestHttpSend;
pub use context::StaticEnv;
pub use credential::Credential;
pub use credential::EnvCredentialProvider;
pub use credential::ENV_ACCESS_KEY_ID;
pub use credential::ENV_SECRET_ACCESS_KEY;
pub use credential::ProvideCredential;
pub use credential::StaticCredentialProvider;
pub use error::Error;
pub use error::ErrorKind;
pub use error::Result;
pub use invoke::Invoker;
pub use invoke::RetryPolicy;
pub use paginate::Paginator;
pub use request::Body;
pub use request::RequestDescriptor;
pub use request::SignedRequest;
pub use request::SigningRequest;
pub use response::BodyTree;
pub use response::ParsedResponse;
pub use response::XmlNode;
pub use sign::HeaderSigner;
pub use sign::QuerySigner;
pub use sign::SignRequest;
pub use sign::Signer;
pub use sign::V4Signer;
pub use variant::ProviderVariant;
pub use variant::SigningScheme;
