//! crates/script_engine_core/src/validation.rs
//!
//! Structural and pedagogical checks over documents and blocks.
//!
//! Hard errors mark a document that must not be committed to a session.
//! Warnings mark content that is structurally fine but pedagogically weak; they
//! never block a commit or an export.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::domain::{Block, BlockBody, BlockId, BlockKind, Document};

/// What a single finding is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum IssueKind {
    EmptyId,
    DuplicateId,
    UnknownType { found: String },
    TypeChanged { expected: BlockKind, found: BlockKind },
    NoOptions,
    NoCorrectOption,
    NoSteps,
    FieldDropped { field: &'static str, kind: BlockKind },
}

impl IssueKind {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            IssueKind::EmptyId
                | IssueKind::DuplicateId
                | IssueKind::UnknownType { .. }
                | IssueKind::TypeChanged { .. }
        )
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::EmptyId => f.write_str("block has an empty id"),
            IssueKind::DuplicateId => f.write_str("block id is used more than once"),
            IssueKind::UnknownType { found } => write!(f, "unknown block type '{found}'"),
            IssueKind::TypeChanged { expected, found } => {
                write!(f, "block type changed from {expected} to {found}")
            }
            IssueKind::NoOptions => f.write_str("assessment has no options"),
            IssueKind::NoCorrectOption => f.write_str("assessment has no correct option"),
            IssueKind::NoSteps => f.write_str("steps block has no steps"),
            IssueKind::FieldDropped { field, kind } => {
                write!(f, "field '{field}' does not apply to a {kind} block and was dropped")
            }
        }
    }
}

/// A finding located at a block position and/or id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_id: Option<BlockId>,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind) -> Self {
        Self {
            index: None,
            block_id: None,
            kind,
        }
    }

    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn on(mut self, id: &BlockId) -> Self {
        if !id.is_blank() {
            self.block_id = Some(id.clone());
        }
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.index, &self.block_id) {
            (Some(index), Some(id)) => write!(f, "block #{index} ({id}): {}", self.kind),
            (Some(index), None) => write!(f, "block #{index}: {}", self.kind),
            (None, Some(id)) => write!(f, "block {id}: {}", self.kind),
            (None, None) => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for ValidationIssue {}

/// The result of validating a document or block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Builds a report by sorting issues into errors and warnings.
    pub fn from_issues(issues: impl IntoIterator<Item = ValidationIssue>) -> Self {
        let mut report = Self::default();
        report.extend(issues);
        report
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        if issue.kind.is_error() {
            self.errors.push(issue);
        } else {
            self.warnings.push(issue);
        }
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = ValidationIssue>) {
        for issue in issues {
            self.push(issue);
        }
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// True when there are no hard errors.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "no errors, {} warning(s)", self.warnings.len());
        }
        let messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join("; "))
    }
}

//=========================================================================================
// Checks
//=========================================================================================

/// Validates a whole document: every block on its own, plus id uniqueness.
pub fn validate(document: &Document) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut seen: HashSet<&BlockId> = HashSet::new();

    for (index, block) in document.blocks.iter().enumerate() {
        report.merge(validate_block_at(block, Some(index)));
        if !block.id.is_blank() && !seen.insert(&block.id) {
            report.push(
                ValidationIssue::new(IssueKind::DuplicateId)
                    .at(index)
                    .on(&block.id),
            );
        }
    }
    report
}

/// Validates a single block outside of any document.
pub fn validate_block(block: &Block) -> ValidationReport {
    validate_block_at(block, None)
}

fn validate_block_at(block: &Block, index: Option<usize>) -> ValidationReport {
    let locate = |kind: IssueKind| {
        let issue = ValidationIssue::new(kind).on(&block.id);
        match index {
            Some(index) => issue.at(index),
            None => issue,
        }
    };

    let mut report = ValidationReport::default();
    if block.id.is_blank() {
        report.push(locate(IssueKind::EmptyId));
    }
    match &block.body {
        BlockBody::Assessment { options } if options.is_empty() => {
            report.push(locate(IssueKind::NoOptions));
        }
        BlockBody::Assessment { options } if !options.iter().any(|o| o.is_correct) => {
            report.push(locate(IssueKind::NoCorrectOption));
        }
        BlockBody::Steps { steps } if steps.is_empty() => {
            report.push(locate(IssueKind::NoSteps));
        }
        _ => {}
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Audience, QuizOption, Tone};
    use pretty_assertions::assert_eq;

    fn block(id: &str, body: BlockBody) -> Block {
        Block::new(id, "Title", "Body", body)
    }

    fn doc(blocks: Vec<Block>) -> Document {
        let mut document = Document::placeholder(Audience::Technical, Tone::Academic);
        document.blocks = blocks;
        document
    }

    #[test]
    fn empty_document_is_clean() {
        assert!(validate(&Document::default()).is_clean());
    }

    #[test]
    fn duplicate_and_empty_ids_are_errors() {
        let document = doc(vec![
            block("a", BlockBody::empty(BlockKind::Theory)),
            block("a", BlockBody::empty(BlockKind::Media)),
            block("  ", BlockBody::empty(BlockKind::Theory)),
        ]);
        let report = validate(&document);

        assert!(!report.is_valid());
        let kinds: Vec<_> = report.errors.iter().map(|i| (i.index, i.kind.clone())).collect();
        assert_eq!(
            kinds,
            vec![(Some(1), IssueKind::DuplicateId), (Some(2), IssueKind::EmptyId)]
        );
    }

    #[test]
    fn assessment_without_options_is_only_a_warning() {
        let document = doc(vec![block("q", BlockBody::Assessment { options: vec![] })]);
        let report = validate(&document);

        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, IssueKind::NoOptions);
        assert_eq!(report.warnings[0].block_id, Some(BlockId::from("q")));
    }

    #[test]
    fn assessment_without_correct_option_warns() {
        let options = vec![QuizOption {
            text: "Maybe".into(),
            is_correct: false,
            feedback: String::new(),
        }];
        let report = validate(&doc(vec![block("q", BlockBody::Assessment { options })]));
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].kind, IssueKind::NoCorrectOption);
    }

    #[test]
    fn empty_steps_warn() {
        let report = validate_block(&block("s", BlockBody::Steps { steps: vec![] }));
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].kind, IssueKind::NoSteps);
    }

    #[test]
    fn validation_is_repeatable() {
        let document = doc(vec![
            block("a", BlockBody::Assessment { options: vec![] }),
            block("a", BlockBody::Steps { steps: vec![] }),
        ]);
        assert_eq!(validate(&document), validate(&document));
    }
}
