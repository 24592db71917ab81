// Radiomon Exporter - Error types
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

use std::net::SocketAddr;

/// Exporter errors.
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    #[error("Engine error: {0}")]
    Engine(#[from] radiomon::MonitorError),

    #[error("Failed to attach monitor")]
    Attach,

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
