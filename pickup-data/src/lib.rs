//! Partner API client and synchronisation pipeline for the pickup-point
//! mirror.
//!
//! [`partner`] talks to the upstream catalog: token caching, paged listing
//! requests and the wire shapes they return. [`sync`] drives a full refresh
//! from any [`partner::PartnerSource`] into any
//! [`pickup_core::CatalogWriter`].

#![forbid(unsafe_code)]

pub mod partner;
pub mod sync;

pub use sync::{SyncError, SyncPipeline, SyncReport, SyncStage};
