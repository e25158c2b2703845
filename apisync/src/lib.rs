//! apisync: mirror API management configuration between service instances
//!
//! An export run reads APIs, products, backends, loggers and named values from
//! a live service into a file-tree snapshot. An import run replays a snapshot
//! against a target service with create-or-replace calls, then links APIs into
//! products.

pub mod adapters;
pub mod client;
pub mod config;
pub mod error;
pub mod isolation;
pub mod links;
pub mod model;
pub mod pager;
pub mod progress;
pub mod snapshot;
pub mod sync;

pub use client::ManagementClient;
pub use config::{Config, ServiceCoordinates, SyncConfig};
pub use error::{Error, Result};
pub use isolation::{Outcome, RunSummary};
pub use links::{read_mapping, LinkMapping, LinkResolver};
pub use model::{LinkEdge, ResourceDescriptor, ResourceKind};
pub use pager::PagedCollectionReader;
pub use progress::SyncProgress;
pub use snapshot::{SnapshotReader, SnapshotWriter};
pub use sync::{Exporter, Importer};
