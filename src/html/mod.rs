//! Viewer page served at `/`.
//!
//! Kept inside the binary so the server needs nothing on disk.

pub const VIEWER_HTML: &str = include_str!("viewer.html");
