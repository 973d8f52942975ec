// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for the external text-generation service.

use async_trait::async_trait;

use crate::error::RapportError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{GenerationRequest, GenerationResponse};

/// Adapter for the text-generation service.
///
/// Implementations return the raw generated text. A response that is empty
/// or otherwise lacks the expected shape must be reported as an error rather
/// than passed through.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a generation request and returns the full response.
    async fn complete(&self, request: GenerationRequest)
    -> Result<GenerationResponse, RapportError>;
}
