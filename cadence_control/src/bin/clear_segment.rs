//! Remove a leftover segment and its metadata sidecar.
//!
//! A crashed back end leaves its segment file behind; a fresh start
//! against that id fails until the file is removed. This tool deletes
//! it, warning when the recorded writer still looks alive.

use std::process::ExitCode;

use clap::Parser;

use cadence_shm::{SegmentRegistry, is_process_alive};

#[derive(Parser)]
#[command(name = "clear_segment", about = "Delete a cadence segment by id")]
struct Args {
    /// Segment id to delete.
    id: String,

    /// Directory holding the segment files.
    #[arg(long, default_value = "/dev/shm")]
    base_dir: String,

    /// Delete even when the recorded writer process is still alive.
    #[arg(long)]
    force: bool,
}

fn main() -> ExitCode {
    cadence_shm::init_tracing();
    let args = Args::parse();
    let registry = SegmentRegistry::with_base_dir(&args.base_dir);

    if !registry.exists(&args.id) {
        tracing::error!(id = args.id, "segment not found");
        return ExitCode::FAILURE;
    }

    if let Ok(info) = registry.info(&args.id)
        && is_process_alive(info.creator_pid)
        && !args.force
    {
        tracing::error!(
            id = args.id,
            pid = info.creator_pid,
            "writer process still alive, use --force to delete anyway"
        );
        return ExitCode::FAILURE;
    }

    match registry.destroy(&args.id) {
        Ok(()) => {
            tracing::info!(id = args.id, "segment deleted");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(id = args.id, %error, "failed to delete segment");
            ExitCode::FAILURE
        }
    }
}
