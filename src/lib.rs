//! medsense-core: a diagnostic retrieval and ranking engine.
//!
//! A patient case (chief complaint, symptoms, age, sex) is turned into a
//! ranked differential diagnosis by a fixed pipeline:
//!
//! ```text
//! PatientCase
//!   ├─▶ red-flag detection (redflag)         ─┐
//!   └─▶ candidate retrieval (retrieval)        │  run concurrently
//!        ├─ encode (encoder, cache-backed)     │
//!        └─ search the vector index (index)  ─┘
//!              │
//!              ▼
//!        score & rank (scoring)
//!              │
//!              ▼
//!        triage classify (triage)
//!              │
//!              ▼
//!        DiagnosticResult
//! ```
//!
//! [`service::AnalysisService`] is the single entry point gluing the above
//! together; everything else is a building block it composes. Ingest
//! ([`ingest`]) is a separate, offline concern: it populates the vector
//! index from ontology sources and is not on the request path.

pub mod cache;
pub mod core;
pub mod encoder;
pub mod index;
pub mod ingest;
pub mod redflag;
pub mod retrieval;
pub mod scoring;
pub mod service;
pub mod triage;

pub use core::config::EngineConfig;
pub use core::errors::{DiagnosisError, Result};
pub use core::types::{
    Condition, DiagnosticResult, PatientCase, ReviewTier, ScoredCandidate, Severity, Sex, Symptom, SymptomList,
};
pub use encoder::TextEncoder;
pub use index::VectorStoreClient;
pub use service::{AnalysisOptions, AnalysisService};
