//! Captures git and build metadata for the `/health` version block.
//!
//! When the tree is built without `.git` (source tarball, container build),
//! the VERGEN_* values may instead be supplied as environment variables and
//! vergen is skipped.

use std::error::Error;
use vergen_gix::{Build, Emitter, Gix};

fn main() -> Result<(), Box<dyn Error>> {
    let has_env_metadata = std::env::var("VERGEN_GIT_SHA").is_ok()
        || std::env::var("VERGEN_GIT_COMMIT_TIMESTAMP").is_ok();

    if has_env_metadata {
        println!("cargo:warning=Using git metadata from environment variables");
        Ok(())
    } else {
        let build = Build::all_build();
        let gix = Gix::all_git();
        Emitter::default()
            .add_instructions(&build)?
            .add_instructions(&gix)?
            .emit()?;
        Ok(())
    }
}
