//! Filesystem setup inside the container's mount namespace.
//!
//! Provides the root switch and the pseudo-filesystem mounts performed
//! by the init process before it replaces its image.

pub mod mount;
pub mod rootfs;
