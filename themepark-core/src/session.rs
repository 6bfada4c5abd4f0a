//! Render session: serializes overlapping dashboard runs
//!
//! Every run takes a ticket from a monotonic generation counter. A finished
//! run commits its dashboard only if no newer ticket was issued meanwhile, so
//! a slow stale run can never overwrite a newer result.

use crate::config::ResolvedConfig;
use crate::dashboard::{build_dashboard, Dashboard, Selection};
use crate::manifest::LoadedManifest;
use crate::taxonomy::Taxonomy;
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Generation token of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RenderTicket(u64);

impl RenderTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
pub struct RenderSession {
    taxonomy: Arc<Taxonomy>,
    latest: AtomicU64,
    committed: Mutex<Option<(RenderTicket, Arc<Dashboard>)>>,
}

impl RenderSession {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        RenderSession {
            taxonomy,
            latest: AtomicU64::new(0),
            committed: Mutex::new(None),
        }
    }

    pub fn taxonomy(&self) -> &Arc<Taxonomy> {
        &self.taxonomy
    }

    /// Issue a new ticket; all earlier tickets become stale
    pub fn begin(&self) -> RenderTicket {
        RenderTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: RenderTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Store `dashboard` if `ticket` is still the latest. Returns whether it
    /// was committed.
    pub fn commit(&self, ticket: RenderTicket, dashboard: Arc<Dashboard>) -> bool {
        let mut committed = self.committed.lock().unwrap_or_else(PoisonError::into_inner);
        // Checked under the lock so a concurrent newer commit cannot interleave
        if !self.is_current(ticket) {
            log::debug!(
                "discarding stale run {} (latest is {})",
                ticket.0,
                self.latest.load(Ordering::SeqCst)
            );
            return false;
        }
        *committed = Some((ticket, dashboard));
        true
    }

    /// Most recently committed dashboard
    pub fn current(&self) -> Option<Arc<Dashboard>> {
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, dashboard)| Arc::clone(dashboard))
    }

    /// Build a dashboard for `selection` and commit it. Returns `None` when a
    /// newer run superseded this one before it finished.
    pub fn render(
        &self,
        manifest: &LoadedManifest,
        selection: &Selection,
        config: &ResolvedConfig,
    ) -> Result<Option<Arc<Dashboard>>> {
        let ticket = self.begin();
        let dashboard = Arc::new(build_dashboard(manifest, selection, &self.taxonomy, config)?);
        if self.commit(ticket, Arc::clone(&dashboard)) {
            Ok(Some(dashboard))
        } else {
            Ok(None)
        }
    }
}
