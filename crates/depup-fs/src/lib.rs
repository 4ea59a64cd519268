//! Ambient filesystem, process, and configuration primitives for depup.
//!
//! # What
//!
//! This crate has no knowledge of packages, ecosystems, or update plans. It
//! provides the three low-level capabilities the rest of the workspace is
//! built on:
//!
//! - [`filesystem`]: async file I/O, atomic write-then-rename, and
//!   backup/restore of a set of files.
//! - [`command`]: bounded, timeout-enforced subprocess execution.
//! - [`config`]: the `Configurable` trait shared by every configuration
//!   struct in this workspace.
//!
//! # How
//!
//! Every capability here is expressed as a trait (`AsyncFileSystem`,
//! `CommandRunner`, `Configurable`) with one concrete, real implementation.
//! depup-core depends only on the traits, so tests can substitute fakes
//! without touching a real filesystem or process table.
//!
//! # Why
//!
//! Splitting these concerns into their own crate mirrors the teacher's
//! `sublime_standard_tools` / `sublime_pkg_tools` split: ambient
//! infrastructure that has nothing to do with dependency updating lives
//! below the crate boundary, so depup-core's surface stays focused on
//! planning and executing updates.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::panic)]

pub mod command;
pub mod config;
pub mod error;
pub mod filesystem;

pub use command::{CommandOutput, CommandRunner, TokioCommandRunner};
pub use config::Configurable;
pub use error::{CommandError, CommandResult, ConfigError, ConfigResult, FileSystemError, FsResult};
pub use filesystem::{
    backup_files, restore_backups, write_file_atomic, write_file_preserving_permissions,
    AsyncFileSystem, FileBackup, TokioFileSystem, DEFAULT_FILE_MODE,
};
