//! Directory-emulation filesystem layer.
//!
//! Responsibilities:
//! - Map filesystem paths to store keys relative to a configured root
//!   prefix (`path`).
//! - Decide path kind (file / directory / missing) from live store state,
//!   falling back to a bounded prefix listing for directories that exist
//!   only implicitly.
//! - Keep the marker invariant across every mutating operation and repair
//!   it after the fact (`repair`).
//!
//! Submodules:
//! - `path`: path normalization and key derivation, no store I/O
//! - `fs`: the `BucketFs` facade with existence, listing and mutations
//! - `repair`: the `fix_storage` tree walk

pub mod fs;
pub mod path;
pub mod repair;
