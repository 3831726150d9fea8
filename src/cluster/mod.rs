// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Connect to the Kubernetes API server and mirror its objects into the cache.
// Author: Lukas Bower

//! Kubernetes API access: configuration discovery, a blocking REST client
//! and the list+watch reflector that feeds [`crate::cache::Store`].

use thiserror::Error;

mod client;
mod config;
pub mod reflector;

pub use client::{ClusterClient, ObjectList, WatchEvent, WatchEventType};
pub use config::ClusterConfig;
pub use reflector::{Reflector, ReflectorSettings};

/// Errors raised while configuring or talking to the API server.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// No usable configuration could be assembled.
    #[error("invalid cluster configuration: {0}")]
    Config(String),
    /// Reading a kubeconfig, token or certificate file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Parsing a kubeconfig failed.
    #[error("kubeconfig: {0}")]
    Kubeconfig(#[from] serde_yaml::Error),
    /// Decoding embedded certificate data failed.
    #[error("certificate data: {0}")]
    Base64(#[from] base64::DecodeError),
    /// Building the TLS client configuration failed.
    #[error("tls: {0}")]
    Tls(#[from] rustls::Error),
    /// The HTTP request failed or returned a non-success status.
    #[error("http: {0}")]
    Http(#[from] Box<ureq::Error>),
    /// An object from the API server lacked required fields.
    #[error("object: {0}")]
    Object(#[from] crate::cache::CacheError),
    /// The API server returned a body that is not the expected JSON.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// The API server reported a failure inside a watch stream.
    #[error("watch error {code}: {message}")]
    Status {
        /// HTTP-style status code, 410 when the resource version expired.
        code: u16,
        /// Server-provided message.
        message: String,
    },
}

impl From<ureq::Error> for ClusterError {
    fn from(err: ureq::Error) -> Self {
        ClusterError::Http(Box::new(err))
    }
}
