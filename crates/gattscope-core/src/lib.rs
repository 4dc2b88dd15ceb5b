//! gattscope Core - GATT identifier normalization and name registries
//!
//! This crate provides the identifier-resolution subsystem:
//! - Normalization of numeric, UUID, and symbolic identifiers to a canonical key
//! - Conflict-aware service and characteristic registries
//! - Name resolution with unloaded/unknown fallbacks
//! - Loading of the JSON registry datasets

pub mod dataset;
pub mod identifier;
pub mod registry;
pub mod resolver;

pub use dataset::{DatasetError, DatasetSource};
pub use identifier::{normalize, Identifier};
pub use registry::{ConflictLog, Registry, RegistryEntry, RegistryKind, ResolvedItem};
pub use resolver::resolve_name;
