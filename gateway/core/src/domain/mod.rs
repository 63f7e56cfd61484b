// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain layer: events, responses, routing and configuration value objects.

pub mod auth;
pub mod event;
pub mod gateway_config;
pub mod node_config;
pub mod response;
pub mod route;
