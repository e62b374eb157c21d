//! Container lifecycle management for the minibox runtime.
//!
//! [`manager::ContainerManager`] owns the lifecycle: it persists records
//! through [`state::RecordStore`] and drives the host through the
//! [`backend::HostBackend`] seam, whose Linux implementation combines the
//! [`isolation::ProcessIsolationEngine`] with cgroups and networking.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod container;
pub mod isolation;
pub mod logs;
pub mod manager;
pub mod state;
