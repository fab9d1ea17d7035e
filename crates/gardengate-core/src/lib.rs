pub mod backend;
pub mod config;
pub mod error;
pub mod manifest;
pub mod policy;
pub mod types;

pub use backend::AuthorizationBackend;
pub use config::GardenConfig;
pub use error::{AccessError, Result};
pub use manifest::ResourceManifest;
pub use policy::AccessPolicy;
pub use types::{AccessRequirement, DenyReason, Verdict, VerifiedIdentity};
