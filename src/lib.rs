//! RailYard
//!
//! Authoring core for visually designed Rails data models. A canvas builds an
//! [`EditorSession`]; exporting it yields a [`SchemaDocument`], which is
//! validated, turned into a scaffolding script and run to produce an app.
//!
//! ## Pipeline
//!
//! ```text
//! EditorSession ──export──▶ SchemaDocument ──validate──▶ [errors]
//!                                 │
//!                                 ├──lint──▶ [advisory warnings]
//!                                 │
//!                                 └──ScriptBuilder──▶ build.sh ──ScriptExecutor──▶ output/{app}
//! ```
//!
//! ## Modules
//!
//! - [`schema`]: the document types and their lenient JSON shape
//! - [`editor`]: in-memory graph of model nodes and association edges
//! - [`validate`]: static checks that gate generation
//! - [`lint`]: advisory checks that never gate generation
//! - [`script`]: deterministic bash script rendering
//! - [`executor`]: isolated script execution
//! - [`server`]: HTTP surface for the canvas

pub mod config;
pub mod editor;
pub mod error;
pub mod executor;
pub mod lint;
pub mod names;
pub mod schema;
pub mod script;
pub mod server;
pub mod validate;

pub use config::RailyardConfig;
pub use editor::{
    suggest_association_name, AssociationEdge, AssociationId, EditorSession, ModelId, ModelNode,
    Position, SessionFile,
};
pub use error::{EditorError, RailyardError, Result};
pub use executor::{ExecutionReport, ExecutionStatus, ScriptExecutor, ScriptRunner};
pub use lint::{LintResult, LintWarning};
pub use schema::SchemaDocument;
pub use script::{generate_script, ScriptBuilder};
pub use validate::{validate, SchemaValidator};
