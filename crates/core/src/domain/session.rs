use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::lead::{Lead, LeadId, LeadStatus};
use crate::domain::slots::{SlotPatch, Slots};
use crate::domain::tenant::TenantId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Created,
    Collecting,
    Qualified,
    Completed,
}

/// What made the session ready for a human hand-off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualifyingSignal {
    Directive,
    SlotsComplete,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub tenant_id: TenantId,
    pub created_at: DateTime<Utc>,
    pub completed: bool,
    pub slots: Slots,
}

impl Session {
    pub fn new(id: SessionId, tenant_id: TenantId) -> Self {
        Self { id, tenant_id, created_at: Utc::now(), completed: false, slots: Slots::default() }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.completed {
            SessionPhase::Completed
        } else if self.slots.is_empty() {
            SessionPhase::Created
        } else {
            SessionPhase::Collecting
        }
    }

    pub fn belongs_to(&self, tenant_id: &TenantId) -> bool {
        &self.tenant_id == tenant_id
    }

    /// Returns whether any slot changed. Completion is never touched here.
    pub fn merge(&mut self, patch: &SlotPatch) -> bool {
        self.slots.merge(patch)
    }

    /// Checks a qualifying signal against the current state without mutating it.
    pub fn qualify(&self, signal: QualifyingSignal) -> Result<SessionPhase, DomainError> {
        if self.completed {
            return Err(DomainError::SessionAlreadyCompleted(self.id.0.clone()));
        }
        if signal == QualifyingSignal::SlotsComplete && !self.slots.is_complete() {
            return Err(DomainError::SlotsIncomplete {
                missing: self.slots.missing_required().join(", "),
            });
        }
        Ok(SessionPhase::Qualified)
    }

    /// Moves a qualified session to its terminal state and snapshots the slots into a lead.
    pub fn complete(&mut self, signal: QualifyingSignal) -> Result<Lead, DomainError> {
        self.qualify(signal)?;
        self.completed = true;

        Ok(Lead {
            id: LeadId::generate(),
            session_id: self.id.clone(),
            tenant_id: self.tenant_id.clone(),
            summary: self.slots.summary(),
            status: LeadStatus::New,
            created_at: Utc::now(),
        })
    }
}
