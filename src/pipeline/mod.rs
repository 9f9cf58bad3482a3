//! Pipeline stages, in execution order:
//!
//! 1. [`rasterize`] — PDF document → page PNGs (2x scale, padded names)
//! 2. [`encode`] — page image file → base64 data URL
//! 3. [`dispatch`] — bounded fan-out of inference calls, ordered fan-in
//! 4. [`inference`] — one chat-completions call per page
//! 5. [`postprocess`] — Markdown cleanup of successful transcriptions

pub mod dispatch;
pub mod encode;
pub mod inference;
pub mod postprocess;
pub mod rasterize;
