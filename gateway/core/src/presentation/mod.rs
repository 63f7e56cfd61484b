// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`flowgate-gateway-core`)
//!
//! HTTP and gRPC surfaces. Request handling is delegated to
//! [`crate::application::ingress`]; nothing here decides what an event means.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | Webhook front door with route table lookup |
//! | [`listener`] | HTTP (Axum) | Supervisor that binds, restarts and drains the front door |
//! | [`grpc`] | gRPC (Tonic) | Node plugin contract served through the plugin SDK |

pub mod api;
pub mod grpc;
pub mod listener;
