// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Etikett.

use thiserror::Error;

/// Top-level error type for all Etikett operations.
#[derive(Debug, Error)]
pub enum EtikettError {
    // -- Device dispatch --
    #[error("device {addr} unreachable after {attempts} attempt(s): {reason}")]
    Dispatch {
        addr: String,
        attempts: u32,
        reason: String,
    },

    #[error("unknown printer: {0}")]
    UnknownPrinter(String),

    // -- Intake --
    #[error("listener error: {0}")]
    Listener(String),

    #[error("HTTP server error: {0}")]
    HttpServer(String),

    #[error("job queue closed")]
    QueueClosed,

    // -- Documents and registries --
    #[error("malformed job document: {0}")]
    Document(String),

    #[error("registry load failed for {path}: {reason}")]
    RegistryLoad { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Plumbing --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EtikettError>;
