// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer: in-memory event fan-out, response correlation and
//! authenticator strategies.

pub mod auth;
pub mod correlation;
pub mod event_bus;
