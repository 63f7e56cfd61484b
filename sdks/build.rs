// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Build Script for flowgate-plugin-sdk
//!
//! Compiles `proto/plugin.proto` into the `flowgate.plugin.v1` message types
//! and the `NodePluginService` client/server stubs. Generated code lands in
//! `OUT_DIR` and is pulled in by `tonic::include_proto!` in `src/lib.rs`.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Protocol code generation

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use the vendored protoc so builds never depend on a system install
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/plugin.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/plugin.proto");

    Ok(())
}
