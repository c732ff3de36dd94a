//! CLI command handlers, one file per command.

mod checksum;
mod clear_cache;
mod status;
mod update;
mod verify;

pub use checksum::run_checksum;
pub use clear_cache::run_clear_cache;
pub use status::run_status;
pub use update::{build_request, run_update, UpdateArgs};
pub use verify::run_verify;

use anyhow::Result;
use bpatch_core::config::PatchConfig;
use bpatch_core::storage::SandboxLayout;

fn layout(cfg: &PatchConfig) -> Result<SandboxLayout> {
    SandboxLayout::from_overrides(cfg.sandbox_dir.as_deref(), cfg.builtin_dir.as_deref())
}
