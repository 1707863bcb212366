//! Integration suite: full pipeline runs against mock Cursor installations.

mod backup_roundtrip;
mod common;
mod locator_fallback;
mod pipeline;
