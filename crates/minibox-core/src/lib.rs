//! # minibox-core
//!
//! Low-level Linux isolation primitives for the minibox runtime.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: process creation with UTS, PID, mount, network, and
//!   IPC isolation, hostname setting, and network-namespace switching.
//! - **Filesystem**: root switching and pseudo-filesystem mounts.
//! - **Cgroups**: CPU, memory, and process-count limits (v1 and v2).
//! - **Network**: the shared bridge and per-container veth pairs.
//!
//! All unsafe system calls are encapsulated in safe wrappers with
//! `// SAFETY:` documentation.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
pub mod filesystem;
pub mod namespace;
pub mod network;
pub mod teardown;
pub mod tool;
