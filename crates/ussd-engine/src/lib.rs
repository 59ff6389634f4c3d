//! USSD session engine.
//!
//! Rebuilds the caller's position in the menu tree from the accumulated
//! gateway text on every request, validates the newest input and renders
//! the next prompt or a terminal result.

pub mod context;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod prompts;
pub mod services;
pub mod tokenizer;
pub mod validation;
pub mod walk;

pub use context::SessionContext;
pub use error::{FlowError, GraphError, ServiceError};
pub use graph::{MenuNode, NavigationGraph, NodeKind};
pub use orchestrator::Orchestrator;
pub use prompts::{Message, PromptCatalog};
pub use services::{
    CachedGeography, GeographyService, RegistrationService, SessionLog, SqliteGeography,
    SqliteRegistry, SqliteSessionLog,
};
pub use tokenizer::Tokenizer;
pub use validation::{Operator, RejectReason, Rejection, ValidationResult, Validator};
pub use walk::{Walk, WalkState, Walker};
