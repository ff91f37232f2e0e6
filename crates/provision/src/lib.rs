//! Provision - supervised provisioning workflows for Debian/Ubuntu hosts
//!
//! The `provision` library runs ordered lists of external commands and file edits
//! against the local machine, relaying command output as it is produced and stopping
//! at the first critical failure. It follows the same ports-and-adapters layout as
//! the rest of the workspace: command execution, the file system, and privilege
//! detection sit behind traits so workflows can be tested without touching the host.
//!
//! # Main Components
//!
//! - [`commands`] - The supervised process runner (port and tokio adapter)
//! - [`workflow`] - Typed steps, the sequential driver, and its event stream
//! - [`desktop`] - The desktop package installation workflow
//! - [`chat_server`] - The ejabberd build-from-source workflow
//! - [`template`] - Validated renderers for generated files
//! - [`config`] - Application configuration loading and validation
//! - [`fs`] - File system abstractions
//! - [`privilege`] - Effective-user checks
//! - [`log_sink`] - Append-only log buffer shared with interactive front ends
//!
//! # Examples
//!
//! ```no_run
//! use provision::{
//!     commands::ProcessCommandRunner,
//!     desktop::{DesktopConfig, desktop_workflow},
//!     fs::real::RealFileSystem,
//!     workflow::WorkflowRunner,
//! };
//!
//! # async fn demo() {
//! let runner = WorkflowRunner::new(ProcessCommandRunner::default(), RealFileSystem);
//! let events = runner.start(desktop_workflow(&DesktopConfig::default(), None));
//! # drop(events);
//! # }
//! ```

pub mod chat_server;
pub mod commands;
pub mod config;
pub mod desktop;
pub mod fs;
pub mod log_sink;
pub mod privilege;
pub mod template;
pub mod validation;
pub mod workflow;
