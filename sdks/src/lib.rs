// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # flowgate Plugin SDK
//!
//! Build node plugins for the flowgate workflow platform. A plugin implements
//! [`PluginHandler`] and is exposed over the `NodePluginService` gRPC
//! contract with [`serve`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use flowgate_plugin_sdk::{proto, serve, PluginHandler, ServeOptions};
//! use tonic::Status;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl PluginHandler for Echo {
//!     async fn get_metadata(&self) -> Result<proto::GetMetadataResponse, Status> {
//!         Ok(proto::GetMetadataResponse { name: "echo".into(), ..Default::default() })
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let addr = "0.0.0.0:50051".parse()?;
//! serve(Arc::new(Echo), ServeOptions::new(addr), std::future::pending()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Layer:** Interface
//! - **Purpose:** Plugin RPC contract, value codec and serving

pub mod proto {
    tonic::include_proto!("flowgate.plugin.v1");
}

pub mod handler;
pub mod lifecycle;
pub mod registration;
pub mod server;
pub mod stream;
pub mod value;

pub use handler::PluginHandler;
pub use lifecycle::{Lifecycle, LifecycleState};
pub use registration::{RegistrationConfig, RegistrationError};
pub use server::{serve, serve_listener, PluginServer, ServeError, ServeOptions};
pub use stream::{StreamClosed, StreamSender};
