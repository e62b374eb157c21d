//! # minibox-image
//!
//! The image collaborator of the minibox runtime. Images live in a local
//! content-addressed store: either as a ready root filesystem or as a
//! manifest of layer blobs that are verified and unpacked on first use.
//! Every container then gets its own copy of that tree.
//!
//! Pulling from a registry is not supported; a missing image is reported
//! as not found.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod copy;
pub mod hash;
pub mod layer;
pub mod reference;
pub mod store;

use std::path::PathBuf;

use minibox_common::error::Result;
use minibox_common::types::ContainerId;

pub use store::LocalImageStore;

/// Supplies container root filesystems.
pub trait ImageProvider: Send + Sync {
    /// Ensures `image` is available and materializes a private root
    /// filesystem for container `id`, returning its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is unknown, fails verification, or
    /// cannot be copied.
    fn check(&self, image: &str, id: &ContainerId) -> Result<PathBuf>;

    /// Returns the previously materialized root filesystem of `id`.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if [`ImageProvider::check`] never ran
    /// for this container.
    fn rootfs(&self, id: &ContainerId) -> Result<PathBuf>;
}
