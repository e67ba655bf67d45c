//! Binds user input to a [`ChatService`] and keeps the transient UI state.
//!
//! The controller is meant for a single-threaded event loop: its state lives
//! in a `RefCell` and no borrow is held across an await point, so chunk
//! callbacks, `cancel` and `reset` may run while a submission is suspended.

use std::cell::RefCell;

use futures::future::AbortHandle;

use crate::client::{ChatService, RequestOptions};
use crate::error::Error;
use crate::message::{ChatMessage, ConversationHistory, Role};
use crate::store::{MessageStore, SessionStorage};

/// Number of most recent messages the UI renders.
pub const RENDER_WINDOW: usize = 12;

/// What happened to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input, or another request was still in flight.
    Ignored,
    /// The assistant replied with this text.
    Completed(String),
    /// The request failed; the string is what the UI shows.
    Failed(String),
    /// The request was cancelled or the history was reset meanwhile.
    Cancelled,
}

#[derive(Debug, Default)]
struct ChatState {
    history: ConversationHistory,
    loading: bool,
    error: Option<String>,
    /// Bumped by `reset`; replies from an older generation are discarded.
    generation: u64,
    cancelled: bool,
    abort: Option<AbortHandle>,
}

impl ChatState {
    fn accepts_chunks(&self, generation: u64) -> bool {
        !self.cancelled
            && self.generation == generation
            && self
                .history
                .last()
                .is_some_and(|message| message.role == Role::Assistant)
    }

    /// Removes the reply placeholder. With `keep_partial`, one that already
    /// received text stays.
    fn drop_placeholder(&mut self, keep_partial: bool) {
        if self.history.last().is_some_and(|message| {
            message.role == Role::Assistant && !(keep_partial && !message.content.is_empty())
        }) {
            self.history.pop();
        }
    }
}

pub struct ChatController<C, S> {
    service: C,
    store: MessageStore<S>,
    state: RefCell<ChatState>,
}

impl<C: ChatService, S: SessionStorage> ChatController<C, S> {
    /// Creates the controller, loading the persisted history from `store`.
    pub fn new(service: C, store: MessageStore<S>) -> Self {
        let history = store.initialize();
        log::debug!(
            "chat controller mounted with {} messages under `{}`",
            history.len(),
            store.key()
        );

        Self {
            service,
            store,
            state: RefCell::new(ChatState {
                history,
                ..Default::default()
            }),
        }
    }

    pub fn store(&self) -> &MessageStore<S> {
        &self.store
    }

    /// The full history, system directive included.
    pub fn history(&self) -> ConversationHistory {
        self.state.borrow().history.clone()
    }

    /// The most recent non-system messages, at most [`RENDER_WINDOW`].
    pub fn visible_messages(&self) -> Vec<ChatMessage> {
        let state = self.state.borrow();
        let visible: Vec<&ChatMessage> = state
            .history
            .iter()
            .filter(|message| !message.is_system())
            .collect();
        let skip = visible.len().saturating_sub(RENDER_WINDOW);

        visible.into_iter().skip(skip).cloned().collect()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn dismiss_error(&self) {
        self.state.borrow_mut().error = None;
    }

    /// Aborts the request in flight, if any. No error banner is raised.
    pub fn cancel(&self) {
        let mut state = self.state.borrow_mut();
        if let Some(abort) = state.abort.take() {
            log::debug!("cancelling chat request");
            state.cancelled = true;
            abort.abort();
        }
    }

    /// Drops the conversation back to its seed and invalidates any reply
    /// still streaming in.
    pub fn reset(&self) {
        let history = {
            let mut state = self.state.borrow_mut();
            if let Some(abort) = state.abort.take() {
                abort.abort();
            }
            state.generation += 1;
            state.loading = false;
            state.error = None;
            state.history = self.store.seed();
            state.history.clone()
        };

        self.store.persist(&history);
    }

    pub async fn submit(&self, input: &str) -> SubmitOutcome {
        self.submit_with(input, &mut |_| {}).await
    }

    /// Sends `input` as a user turn. `render` sees every streamed fragment
    /// that was folded into the history.
    pub async fn submit_with(&self, input: &str, render: &mut dyn FnMut(&str)) -> SubmitOutcome {
        let input = input.trim();
        if input.is_empty() || self.is_loading() {
            return SubmitOutcome::Ignored;
        }

        let (abort, signal) = AbortHandle::new_pair();
        let (request, generation) = {
            let mut state = self.state.borrow_mut();
            state.history.push(ChatMessage::user(input));
            let request = state.history.clone();
            state.history.push(ChatMessage::assistant(String::new()));
            state.loading = true;
            state.error = None;
            state.cancelled = false;
            state.abort = Some(abort);
            (request, state.generation)
        };
        self.store.persist(&request);

        let mut fold = |chunk: &str| {
            let mut state = self.state.borrow_mut();
            if !state.accepts_chunks(generation) {
                return;
            }
            if let Some(last) = state.history.last_mut() {
                last.content.push_str(chunk);
            }
            drop(state);
            render(chunk);
        };

        let result = self
            .service
            .send_chat_request(
                &request,
                RequestOptions {
                    signal: Some(signal),
                    on_chunk: Some(&mut fold),
                },
            )
            .await;

        self.settle(result, generation)
    }

    fn settle(&self, result: Result<String, Error>, generation: u64) -> SubmitOutcome {
        let (outcome, history) = {
            let mut state = self.state.borrow_mut();
            if state.generation != generation {
                log::debug!("discarding reply for a reset conversation");
                return SubmitOutcome::Cancelled;
            }

            state.loading = false;
            state.abort = None;

            let cancelled = state.cancelled || matches!(result, Err(Error::Cancelled));
            let outcome = match result {
                _ if cancelled => {
                    log::debug!("chat request cancelled");
                    state.drop_placeholder(false);
                    SubmitOutcome::Cancelled
                }
                Ok(text) => {
                    if let Some(last) = state
                        .history
                        .last_mut()
                        .filter(|message| message.role == Role::Assistant)
                    {
                        last.content.clone_from(&text);
                    }
                    SubmitOutcome::Completed(text)
                }
                Err(e) => {
                    state.drop_placeholder(true);
                    match e.user_message() {
                        Some(message) => {
                            log::warn!("chat request failed: {e}");
                            state.error = Some(message.clone());
                            SubmitOutcome::Failed(message)
                        }
                        None => SubmitOutcome::Cancelled,
                    }
                }
            };

            (outcome, state.history.clone())
        };

        self.store.persist(&history);
        outcome
    }
}
