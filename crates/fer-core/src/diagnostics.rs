//! The diagnostics accumulator and error taxonomy (spec.md §7).
//!
//! Most errors are *values*, pushed onto a process-wide [`Report`] rather
//! than returned as `Err` (spec.md §9: "walkers never throw or unwind").
//! Only [`AnalysisError`]'s `Critical` family aborts the *current module's*
//! phase advancement — everything else is recorded and the walker keeps
//! going, letting downstream checks see an `Invalid`/`None` type and
//! suppress further cascades.

use std::ops::Range;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan, NamedSource, SourceSpan};
use thiserror::Error;

use crate::{file::SourceFile, module::ModuleKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    SemanticError,
    CriticalError,
}

/// Which walker produced the diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collector,
    Resolver,
    Typecheck,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Collector => "collector",
            Phase::Resolver => "resolver",
            Phase::Typecheck => "typecheck",
        };
        f.write_str(s)
    }
}

/// The error-kind taxonomy from spec.md §7's table. Not exhaustive of every
/// English example in the table, but covers every row's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Policy,
    Lookup,
    Shape,
    Compatibility,
    Structure,
    ControlFlow,
    Critical,
}

/// A single accumulated diagnostic.
#[derive(Debug, Clone)]
pub struct Diag {
    pub category: Category,
    pub severity: Severity,
    pub phase: Phase,
    pub message: String,
    pub help: Option<String>,
    pub source: SourceFile,
    pub primary: Range<usize>,
    pub primary_label: String,
    /// Additional labeled positions: e.g. the earlier declaration in a
    /// redeclaration error, or up to three missing-return locations.
    pub related: Vec<(Range<usize>, String)>,
}

impl Diag {
    pub fn new(
        category: Category,
        severity: Severity,
        phase: Phase,
        message: impl Into<String>,
        source: SourceFile,
        primary: Range<usize>,
    ) -> Self {
        Self {
            category,
            severity,
            phase,
            message: message.into(),
            help: None,
            source,
            primary,
            primary_label: String::new(),
            related: Vec::new(),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.primary_label = label.into();
        self
    }

    pub fn with_related(mut self, position: Range<usize>, label: impl Into<String>) -> Self {
        self.related.push((position, label.into()));
        self
    }
}

impl std::fmt::Display for Diag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Diag {}

impl MietteDiagnostic for Diag {
    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.severity {
            Severity::Warning => miette::Severity::Warning,
            Severity::SemanticError => miette::Severity::Error,
            Severity::CriticalError => miette::Severity::Error,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.help.as_ref().map(|h| Box::new(h.clone()) as Box<dyn std::fmt::Display>)
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(self.source.code.as_str() as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let primary = LabeledSpan::new_with_span(
            Some(self.primary_label.clone()),
            to_span(&self.primary),
        );
        let rest = self
            .related
            .iter()
            .map(|(range, label)| LabeledSpan::new_with_span(Some(label.clone()), to_span(range)));
        Some(Box::new(std::iter::once(primary).chain(rest)))
    }
}

fn to_span(range: &Range<usize>) -> SourceSpan {
    SourceSpan::new(range.start.into(), range.end.saturating_sub(range.start))
}

pub fn named_source(file: &SourceFile) -> NamedSource<String> {
    NamedSource::new(file.display_name(), file.code().to_string())
}

/// Accumulates diagnostics across an entire analysis run.
#[derive(Debug, Default)]
pub struct Report {
    diagnostics: Vec<Diag>,
}

impl Report {
    pub fn push(&mut self, diag: Diag) {
        self.diagnostics.push(diag);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity >= Severity::SemanticError)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diag> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Diagnostics sorted by file then source location (spec.md §7:
    /// "diagnostics are sorted by file then source location before
    /// rendering").
    pub fn sorted(&self) -> Vec<&Diag> {
        let mut items: Vec<&Diag> = self.diagnostics.iter().collect();
        items.sort_by(|a, b| {
            a.source
                .display_name()
                .cmp(&b.source.display_name())
                .then_with(|| a.primary.start.cmp(&b.primary.start))
        });
        items
    }
}

/// Errors that stop a single module's phase advancement (spec.md §7,
/// "Critical" row). Never used to abort unrelated modules: the
/// orchestrator's top-level driver catches one module's `Err` and moves on
/// to the next (mirrors the teacher's `tir::build` loop, which keeps
/// processing remaining files after one fails).
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("module '{0}' not found")]
    ModuleNotFound(ModuleKey),

    #[error("import cycle detected: {}", .0.iter().map(|k| k.0.as_str()).collect::<Vec<_>>().join(" -> "))]
    ImportCycle(Vec<ModuleKey>),

    #[error("{0}")]
    Diagnosed(String),
}
