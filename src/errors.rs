//! Error Types
//!
//! This module defines the error types used throughout the renderer core.
//!
//! # Overview
//!
//! The main error type [`EmberError`] covers the failure modes this crate can
//! recover from:
//! - Frame-graph construction errors (unknown node types, dependency cycles)
//! - Resource validation errors (malformed user-supplied textures)
//!
//! Allocation failures reported by the graphics backend are deliberately *not*
//! represented here: GPU memory exhaustion is not something a real-time
//! renderer can render around, so backends treat it as fatal.
//!
//! # Usage
//!
//! Public APIs that can fail return [`Result<T>`], an alias for
//! `std::result::Result<T, EmberError>`.

use thiserror::Error;

use crate::graph::NodeId;

/// The main error type for the Ember renderer core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmberError {
    // ========================================================================
    // Frame-graph construction errors
    // ========================================================================
    /// A node listed another node type as a dependency, but no such type is
    /// registered.
    #[error("cannot find render compositor node of type \"{0}\"")]
    UnknownNodeType(NodeId),

    /// The dependency graph contains a cycle through the named node.
    #[error("render compositor node recursion detected at node \"{0}\"")]
    CircularDependency(NodeId),

    // ========================================================================
    // Resource validation errors
    // ========================================================================
    /// A user-supplied resource has the wrong shape for its intended use
    /// (e.g. an IBL cubemap with a non-power-of-two size or an incomplete
    /// mip chain). The offending feature degrades gracefully.
    #[error("invalid {context}: {detail}")]
    InvalidResource {
        /// What the resource was being used for.
        context: &'static str,
        /// Description of the mismatch.
        detail: String,
    },
}

/// Alias for `Result<T, EmberError>`.
pub type Result<T> = std::result::Result<T, EmberError>;
