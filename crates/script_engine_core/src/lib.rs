pub mod cost;
pub mod domain;
pub mod error;
pub mod export;
pub mod patch;
pub mod ports;
pub mod session;
pub mod validation;
pub mod wire;

#[cfg(test)]
mod testing;

pub use cost::{estimate_cost, RateTable};
pub use domain::{
    AssetKind, Audience, Block, BlockBody, BlockId, BlockKind, Direction, Document,
    GeneratedAssets, Language, QuizOption, Tone, Tooltip, UsageStats,
};
pub use error::{BusyReason, SessionError, SessionResult};
pub use patch::{BlockPatch, DocumentMetaPatch, PatchError};
pub use ports::{GeneratedDocument, GenerationGateway, OnboardingStore, PortError, PortResult};
pub use session::{BlockOperation, EditingSession, Generated};
pub use validation::{validate, IssueKind, ValidationIssue, ValidationReport};
