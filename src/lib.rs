//! HyperMetro Client - Mirrored Volume Management Plane
//!
//! A management-plane client for dual-controller, dual-site block-storage
//! arrays: it provisions, attaches, extends, and destroys synchronously
//! mirrored volumes (HyperMetro pairs) spanning a local and a remote array.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        MetroClient                              │
//! │              (volume lifecycle orchestrator)                    │
//! ├────────────────────────────────┬────────────────────────────────┤
//! │         Local Device           │         Remote Device          │
//! │  ┌──────────────────────────┐  │  ┌──────────────────────────┐  │
//! │  │  Resource primitives     │  │  │  Resource primitives     │  │
//! │  │  (LUN / host / groups /  │  │  │  (LUN / host / groups /  │  │
//! │  │   snapshot / mapping)    │  │  │   snapshot / mapping)    │  │
//! │  ├──────────────────────────┤  │  ├──────────────────────────┤  │
//! │  │  Retrying executor       │  │  │  Retrying executor       │  │
//! │  ├──────────────────────────┤  │  ├──────────────────────────┤  │
//! │  │  Session manager         │  │  │  Session manager         │  │
//! │  │  (controller failover)   │  │  │  (controller failover)   │  │
//! │  └────────────┬─────────────┘  │  └────────────┬─────────────┘  │
//! └───────────────┼────────────────┴───────────────┼────────────────┘
//!                 │ HTTPS REST                     │ HTTPS REST
//!          ┌──────┴──────┐                  ┌──────┴──────┐
//!          │ Local array │ ◄── HyperMetro ─►│ Remote array│
//!          └─────────────┘      mirror      └─────────────┘
//! ```
//!
//! Every request flows through the retrying executor, which replays a
//! fully-buffered request after a transparent re-login when the array rejects
//! the session token. The orchestrator composes those retry-safe primitives
//! into the cross-array workflows and wraps each failing step with its name.
//!
//! # Modules
//!
//! - [`client`]: the paired-array client handle
//! - [`volume`]: create / clone / delete / extend / attach / detach workflows
//! - [`metro`]: HyperMetro pair and domain operations
//! - [`device`]: per-array resource primitives
//! - [`rest`]: session management, request templates, envelope decoding
//! - [`config`]: connection settings
//! - [`error`]: error types and handling

pub mod client;
pub mod config;
pub mod device;
pub mod error;
pub mod metro;
pub mod naming;
pub mod rest;
pub mod volume;

// Re-export commonly used types
pub use client::MetroClient;
pub use config::{ClientConfig, DeviceConfig};
pub use device::{
    Device, Host, HostGroup, Initiator, Lun, LunCopy, LunGroup, MappingView, PortGroup, Snapshot,
    StoragePool,
};
pub use error::{Error, ResourceKind, Result};
pub use metro::{HyperMetroDomain, HyperMetroPair, PairStatus};
pub use naming::{encode_name, MAX_NAME_LENGTH};
pub use rest::SearchQuery;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
