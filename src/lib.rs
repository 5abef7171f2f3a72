//! desktidy - a background tidying daemon for Downloads and Desktop
//!
//! This library keeps a small set of "organized roots" tidy: files are
//! classified by extension into category/subcategory folders, similar names
//! are gathered into group folders, files untouched for weeks are promoted
//! to a Review folder, and directories left empty by all that moving are
//! swept away. Passes are idempotent: a second pass over an already-tidy
//! root moves nothing.

pub mod classifier;
pub mod cleaner;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod grouper;
pub mod monitor;
pub mod organizer;
pub mod output;
pub mod tagger;

pub use classifier::{CategoryTable, Classification};
pub use config::{CompiledFilters, ConfigError, Settings};
pub use grouper::Grouper;
pub use monitor::AccessMonitor;
pub use organizer::{OrganizeError, Organizer, PassPhase, PassReport};

pub use cli::{run, Cli};
