//! Semantic analysis core for the Fer language compiler.
//!
//! This crate is the semantic-analysis frontend of a compiler for a
//! statically-typed language: given a parsed module graph, it produces a
//! fully resolved and type-checked representation. Lexing and parsing are
//! out of scope — source text never reaches this crate; a [`loader`]
//! abstracts over however the caller gets a [`ast::FileAst`].
//!
//! # Architecture
//!
//! Three tightly coupled subsystems, run by the [`orchestrator`]:
//!
//! 1. **Module graph orchestration & import resolution** — [`module`],
//!    [`registry`], [`import`], [`loader`].
//! 2. **Symbol collection & resolution** — [`collector`], [`resolver`],
//!    built on [`symbol`] and [`scope`].
//! 3. **Type derivation, assignability, and control flow** — [`typecheck`],
//!    built on the type lattice in [`types`].
//!
//! [`diagnostics`] is the shared error taxonomy every phase reports into;
//! [`context`] ties all of the above together into one [`context::AnalysisContext`].
//!
//! # Usage
//!
//! ```ignore
//! use fer_core::{context::AnalysisContext, loader, module::{ModuleKey, Phase}, orchestrator};
//!
//! let mut ctx = AnalysisContext::new("myproj", true);
//! let failed = loader::load_graph(&mut ctx, &[ModuleKey::new("main".into())], &my_loader);
//! orchestrator::run_all(&mut ctx);
//! for diag in ctx.report.sorted() {
//!     eprintln!("{diag}");
//! }
//! ```

pub mod ast;
pub mod collections;
pub mod collector;
pub mod context;
pub mod diagnostics;
pub mod file;
pub mod import;
pub mod loader;
pub mod module;
pub mod orchestrator;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod symbol;
pub mod typecheck;
pub mod types;

pub use context::AnalysisContext;
pub use diagnostics::{AnalysisError, Diag, Report};
pub use module::{ModuleKey, Phase};
