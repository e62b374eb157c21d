//! The persistent container record.

use chrono::{DateTime, Utc};
use minibox_common::types::{ContainerId, ContainerStatus};
use serde::{Deserialize, Serialize};

/// One container, as stored in its `container.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Clock-derived identifier, never changed after creation.
    pub id: ContainerId,
    /// Human-readable name.
    pub name: String,
    /// Image reference the container was created from.
    pub image: String,
    /// Command line, arguments joined by single spaces.
    pub command: String,
    /// Creation timestamp.
    pub create_time: DateTime<Utc>,
    /// Lifecycle state.
    pub status: ContainerStatus,
    /// Host-visible PID of the init process; `0` until it is started.
    pub pid: u32,
}

impl Container {
    /// Creates a `running` record with no process yet.
    #[must_use]
    pub fn new(id: ContainerId, name: &str, image: &str, command: &[String]) -> Self {
        Self {
            id,
            name: name.to_owned(),
            image: image.to_owned(),
            command: command.join(" "),
            create_time: Utc::now(),
            status: ContainerStatus::Running,
            pid: 0,
        }
    }

    /// Returns `true` once the record reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status != ContainerStatus::Running
    }
}

/// One row of a container listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSummary {
    /// Container identifier.
    pub id: ContainerId,
    /// Human-readable name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Lifecycle state.
    pub status: ContainerStatus,
}

impl From<&Container> for ContainerSummary {
    fn from(c: &Container) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            image: c.image.clone(),
            status: c.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_running_without_pid() {
        let cmd = vec!["/bin/echo".to_owned(), "hello world".to_owned()];
        let c = Container::new(ContainerId::new("1"), "box", "busybox", &cmd);
        assert_eq!(c.status, ContainerStatus::Running);
        assert_eq!(c.pid, 0);
        assert_eq!(c.command, "/bin/echo hello world");
        assert!(!c.is_terminal());
    }

    #[test]
    fn record_json_uses_documented_field_names() {
        let c = Container::new(ContainerId::new("42"), "box", "busybox", &["sh".to_owned()]);
        let json: serde_json::Value = serde_json::to_value(&c).unwrap();
        for field in ["id", "name", "image", "command", "create_time", "status", "pid"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert_eq!(json["status"], "running");
        assert_eq!(json["id"], "42");
    }
}
