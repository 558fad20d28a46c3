//! Station configuration
//!
//! Two tiers: the local store is the source of truth for reads, the remote
//! settings endpoint is a backup that heals a wiped device.
//!
//! ```text
//! set(key, v) ──► local write ──► spawn push(record) ──► remote (fire-and-forget)
//!
//! startup ──► reconcile() ──► fetch remote ──► gap_fill(local, remote) ──► local
//! ```

mod keys;
mod reconcile;

pub use keys::SettingKey;
pub use reconcile::{GapFill, MRU_CAP, ReconcileReport, ReconcilingStore, gap_fill};
