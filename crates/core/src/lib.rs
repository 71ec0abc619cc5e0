pub mod config;
pub mod directive;
pub mod domain;
pub mod errors;
pub mod plan;
pub mod vault;

pub use directive::{parse_reply, Directive, ParsedReply};
pub use domain::lead::{Lead, LeadId, LeadStatus};
pub use domain::message::{Message, MessageId, MessageRole};
pub use domain::session::{QualifyingSignal, Session, SessionId, SessionPhase};
pub use domain::slots::{ClientSlots, MealPlan, RestType, SlotPatch, Slots};
pub use domain::tenant::{
    DestinationCatalog, Persona, PlanTier, Tenant, TenantCredentials, TenantId, Tone,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use plan::{PlanCapabilities, PlanGate, TourSource};
pub use vault::{CredentialVault, DecryptionError, SealedSecret};
