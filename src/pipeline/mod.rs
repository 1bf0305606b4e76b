//! Content pipeline between capture and publication.
//!
//! ```text
//! captured bytes ──▶ decode ──▶ extract ──▶ convert ──▶ node tree
//!                                             │
//!                                             ▼
//!                                rehost each src / data-src
//!                            (download ▶ media ▶ upload chain)
//! ```
//!
//! 1. [`decode`]  bytes to UTF-8 using the declared or detected charset
//! 2. [`extract`] pick the article body and title out of the full document
//! 3. [`convert`] HTML fragment to ordered [`crate::node::DocumentNode`]s
//! 4. [`rehost`]  move every referenced media file to an upload backend
//! 5. [`media`]   content sniffing, WebP transcoding, screenshot slicing;
//!    CPU-bound, runs in `spawn_blocking`

pub mod convert;
pub mod decode;
pub mod extract;
pub mod media;
pub mod rehost;
