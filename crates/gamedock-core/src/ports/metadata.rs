//! Game metadata lookup port.

use async_trait::async_trait;
use thiserror::Error;

use crate::queue::ResourceMetadata;

/// Metadata lookup failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataError {
    /// The catalog has no such resource.
    #[error("No catalog entry for {resource_id}")]
    NotFound { resource_id: String },

    /// The catalog could not be reached or returned garbage.
    #[error("Catalog unavailable: {message}")]
    Unavailable { message: String },
}

/// Resolves a resource key to display metadata.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Look up title, size, and images for a resource.
    async fn resolve(&self, resource_id: &str) -> Result<ResourceMetadata, MetadataError>;
}
