// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # flowgate HTTP Gateway Core
//!
//! Receives HTTP requests, authenticates them and fans them out as trigger
//! events to workflow workers subscribed over the plugin RPC contract.
//! Requests in sync mode wait for a worker to deliver a response.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, event bus, correlation and HTTP/gRPC surfaces
//!
//! | Layer | Contents |
//! |-------|----------|
//! | [`domain`] | Events, responses, routes, filter and node configuration |
//! | [`application`] | Payload canonicalization and the ingress state machine |
//! | [`infrastructure`] | Event bus, response correlation, authenticators |
//! | [`presentation`] | Axum front door, listener supervisor, gateway plugin |

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use presentation::grpc::GatewayPlugin;
