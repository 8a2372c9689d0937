//! Firmware sources and toolchain
//!
//! - `sources`: distribution identity and variant resolution
//! - `git`: cloning and release checkout
//! - `patcher`: compatibility edits to cloned trees
//! - `toolchain`: cross-compiler build and install

pub mod git;
pub mod patcher;
pub mod sources;
pub mod toolchain;

pub use git::{SourceStager, StagedSource};
pub use patcher::DistributionPatcher;
pub use sources::{Distribution, DistributionVariant};
pub use toolchain::ToolchainBuilder;
