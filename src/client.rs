//! The data-access facade and the pipeline shared by its transports.
//!
//! Implementation details are split into submodules under `src/client/`.

pub mod base;
mod base_service;
mod builder;
mod cancel;
mod service;

pub use base::{BaseClient, Dispatch};
pub use base_service::BaseService;
pub use builder::ApiServiceBuilder;
pub use service::{ApiService, RequestDefaults};
