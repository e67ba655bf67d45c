//! Opt-in debug reporting over a [`ChatController`].
//!
//! Nothing is registered globally: a front-end attaches a [`Diagnostics`]
//! when the user asks for it and detaches it when done.

use std::time::Instant;

use serde::Serialize;

use crate::client::ChatService;
use crate::controller::ChatController;
use crate::store::SessionStorage;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DiagnosticReport {
    pub storage_key: String,
    pub history_len: usize,
    pub visible_len: usize,
    pub has_system_message: bool,
    pub loading: bool,
    pub error: Option<String>,
    /// Size of the persisted value, `None` when nothing is stored.
    pub stored_bytes: Option<usize>,
    pub attached_for_ms: u64,
}

pub struct Diagnostics<'a, C, S> {
    controller: &'a ChatController<C, S>,
    attached_at: Instant,
}

impl<'a, C: ChatService, S: SessionStorage> Diagnostics<'a, C, S> {
    pub fn attach(controller: &'a ChatController<C, S>) -> Self {
        log::debug!("diagnostics attached to `{}`", controller.store().key());
        Self {
            controller,
            attached_at: Instant::now(),
        }
    }

    pub fn report(&self) -> DiagnosticReport {
        let store = self.controller.store();
        let history = self.controller.history();
        let stored_bytes = match store.storage().get_item(store.key()) {
            Ok(value) => value.map(|value| value.len()),
            Err(e) => {
                log::warn!("diagnostics could not read `{}`: {e}", store.key());
                None
            }
        };

        DiagnosticReport {
            storage_key: store.key().to_string(),
            history_len: history.len(),
            visible_len: self.controller.visible_messages().len(),
            has_system_message: history.first().is_some_and(|message| message.is_system()),
            loading: self.controller.is_loading(),
            error: self.controller.error(),
            stored_bytes,
            attached_for_ms: u64::try_from(self.attached_at.elapsed().as_millis())
                .unwrap_or(u64::MAX),
        }
    }

    /// Detaches and returns a last report.
    pub fn detach(self) -> DiagnosticReport {
        let report = self.report();
        log::debug!("diagnostics detached from `{}`", report.storage_key);
        report
    }
}
