//! Image reference parsing.

use std::fmt;

use minibox_common::error::{MiniboxError, Result};

const DEFAULT_TAG: &str = "latest";

/// A `repository[:tag]` image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Repository path, e.g. `busybox` or `library/alpine`.
    pub repository: String,
    /// Tag, `latest` when omitted.
    pub tag: String,
}

impl ImageRef {
    /// Parses a user-supplied reference.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty repository or tag, or a reference
    /// that could escape the image directory.
    pub fn parse(reference: &str) -> Result<Self> {
        let (repository, tag) = match reference.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') => (repo, tag),
            _ => (reference, DEFAULT_TAG),
        };
        if repository.is_empty()
            || tag.is_empty()
            || reference.contains("..")
            || repository.starts_with('/')
        {
            return Err(MiniboxError::Config {
                message: format!("invalid image reference: {reference:?}"),
            });
        }
        Ok(Self {
            repository: repository.to_owned(),
            tag: tag.to_owned(),
        })
    }

    /// Directory name of this image below the images root.
    #[must_use]
    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.repository.replace('/', "_"), self.tag)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}
