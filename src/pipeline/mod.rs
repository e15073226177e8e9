//! Pipeline stages for chunked PDF inversion.
//!
//! Each submodule implements one step of a run.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ plan ──▶ workspace ──▶ pool ──▶ worker × N ──▶ merge ──▶ cleanup
//!                                            │
//!                                 render ──▶ invert ──▶ document
//! ```
//!
//! 1. [`input`]     — check the path is a readable PDF
//! 2. [`workspace`] — per-run temporary namespace; removed on every exit path
//! 3. [`pool`]      — bounded dispatch of chunk jobs onto `spawn_blocking`
//! 4. [`worker`]    — one chunk: [`render`] pages, [`invert`] them, write a
//!    [`document`] artifact
//! 5. [`merge`]     — verify artifacts against the plan and splice them in
//!    page order into the output

pub mod document;
pub mod input;
pub mod invert;
pub mod merge;
pub mod pool;
pub mod render;
pub mod worker;
pub mod workspace;
