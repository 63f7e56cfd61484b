// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Plugin RPC surface of the gateway.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** Exposes [`gateway_plugin::GatewayPlugin`] through the plugin SDK

pub mod gateway_plugin;

pub use gateway_plugin::GatewayPlugin;
