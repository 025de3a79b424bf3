//! Router and bridge tests against in-memory collaborators
