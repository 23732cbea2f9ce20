// ABOUTME: Support library for the draftly binary
// ABOUTME: Project directory I/O and logging setup shared by the CLI commands

pub mod logging;
pub mod project_io;

pub use project_io::{load_project, read_file_map_json, write_project, ProjectIoError};
