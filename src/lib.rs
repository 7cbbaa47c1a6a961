//! # Retouch
//!
//! Non-destructive image editing for media libraries. Every save writes new
//! files next to the original and records what it replaced, so any asset can
//! be returned to exactly what was uploaded.
//!
//! # Architecture: Edit and Restore
//!
//! ```text
//! import   file      →  metadata + renditions      (empty backup registry)
//! edit     history   →  -e<suffix> files           (replaced files archived)
//! restore  registry  →  metadata points at -orig   (edits archived or purged)
//! ```
//!
//! Pixels only flow through [`edit`] and [`upload`]. [`restore`] is pure
//! bookkeeping over the backup registry: the uploaded files are never
//! modified, so restoring is a metadata swap.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`history`] | Edit operations, their JSON wire form, canonicalization |
//! | [`imaging`] | Backend traits, the `image`-crate backend, crop and resize math |
//! | [`renditions`] | Which sizes a save regenerates for each target |
//! | [`naming`] | `-e<suffix>` and `-<w>x<h>` file name conventions |
//! | [`backup`] | Backup registry: `-orig` and versioned entries, unique suffixes |
//! | [`store`] | Persistence of metadata and registries, per-asset locking |
//! | [`edit`] | The save pipeline and preview rendering |
//! | [`restore`] | The restore pipeline |
//! | [`upload`] | Importing a new asset and generating its first renditions |
//! | [`config`] | `retouch.toml` loading, merging and validation |
//! | [`types`] | Asset ids and image metadata shared by every stage |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Never Overwrite in Place
//!
//! A save always picks a file name that does not exist yet. Even in overwrite
//! mode the new version is written under a fresh name and the previous edit
//! is deleted only after the metadata commit succeeds, so a crash at any
//! point leaves the asset pointing at complete files.
//!
//! ## Originals Are Immutable
//!
//! The first time a size is replaced its descriptor is archived as
//! `<size>-orig`. That entry is never rewritten, and files it references are
//! never deleted, by either pipeline.
//!
//! ## One Commit per Operation
//!
//! Metadata and the backup registry are written together at the end of an
//! edit or restore, under the asset's lock. Files written before a failed
//! commit are removed again.

pub mod backup;
pub mod config;
pub mod edit;
pub mod history;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod renditions;
pub mod restore;
pub mod store;
pub mod types;
pub mod upload;
