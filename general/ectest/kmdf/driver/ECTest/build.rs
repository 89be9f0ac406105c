// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! Emits the linker and include configuration of the installed WDK for the
//! KMDF version declared in the workspace metadata.

fn main() -> anyhow::Result<()> {
    wdk_build::configure_wdk_binary_build()?;
    Ok(())
}
