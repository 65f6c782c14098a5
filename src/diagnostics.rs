// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-round diagnostics sink.
//!
//! Resolvers, preparation hooks and cleanup hooks receive a
//! `&mut Diagnostics` instead of logging through a per-type global. Each
//! data-quality correction is emitted as a `tracing` warning tagged with
//! the polled device and also kept, so the caller gets the full list back
//! in the [`crate::RoundReport`].

use tracing::{info, warn};

use crate::metrics;
use crate::model::EntityKind;

/// A data-quality correction applied locally instead of failing the round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub kind: EntityKind,
    /// Container key of the corrected shadow.
    pub key: String,
    pub field: String,
    pub message: String,
}

#[derive(Debug)]
pub struct Diagnostics {
    sysname: String,
    corrections: Vec<Correction>,
}

impl Diagnostics {
    #[must_use]
    pub fn new(sysname: impl Into<String>) -> Self {
        Self {
            sysname: sysname.into(),
            corrections: Vec::new(),
        }
    }

    /// Sysname of the device this round is for.
    #[must_use]
    pub fn sysname(&self) -> &str {
        &self.sysname
    }

    /// Record a correction and log it as a warning.
    pub fn correction(&mut self, kind: EntityKind, key: &str, field: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(
            sysname = %self.sysname,
            kind = %kind,
            key = %key,
            field = %field,
            "{}", message
        );
        metrics::record_correction(kind.as_str());
        self.corrections.push(Correction {
            kind,
            key: key.to_string(),
            field: field.to_string(),
            message,
        });
    }

    /// Informational note; logged, not recorded.
    pub fn note(&self, kind: EntityKind, message: impl AsRef<str>) {
        info!(sysname = %self.sysname, kind = %kind, "{}", message.as_ref());
    }

    #[must_use]
    pub fn corrections(&self) -> &[Correction] {
        &self.corrections
    }

    #[must_use]
    pub fn into_corrections(self) -> Vec<Correction> {
        self.corrections
    }
}
