use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use crate::api::ConversationApi;
use crate::config::{Settings, SettingsStore};
use crate::coordinator::SideEffectCoordinator;
use crate::errors::{ClientError, SideEffectError, ValidationError};
use crate::export::ExportFile;
use crate::session::controller::SessionController;
use crate::session::intent::{ApiCall, Completion, Effect, Intent, RequestId};
use crate::session::view::ViewModel;

/// Runs a [`SessionController`] on the tokio runtime.
///
/// Network calls and voice capture are spawned as tasks; their results come
/// back through a channel and are applied one at a time, in the order they
/// finish. Audio and speech effects are handed to the coordinator inline.
/// After every applied event the new [`ViewModel`] is published on a `watch`
/// channel.
pub struct SessionDriver {
    controller: SessionController,
    api: Arc<dyn ConversationApi>,
    coordinator: SideEffectCoordinator,
    settings_store: Option<SettingsStore>,
    export_dir: PathBuf,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
    view_tx: watch::Sender<ViewModel>,
}

impl SessionDriver {
    pub fn new(api: Arc<dyn ConversationApi>, coordinator: SideEffectCoordinator, settings: Settings) -> Self {
        let controller = SessionController::new(settings);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (view_tx, _) = watch::channel(controller.view());
        Self {
            controller,
            api,
            coordinator,
            settings_store: None,
            export_dir: PathBuf::from("."),
            completions_tx,
            completions_rx,
            in_flight: 0,
            view_tx,
        }
    }

    pub fn with_settings_store(mut self, store: SettingsStore) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.view_tx.subscribe()
    }

    pub fn view(&self) -> ViewModel {
        self.view_tx.borrow().clone()
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn api(&self) -> Arc<dyn ConversationApi> {
        Arc::clone(&self.api)
    }

    /// Number of spawned operations whose results have not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub async fn dispatch(&mut self, intent: Intent) -> Result<(), ValidationError> {
        debug!("Intent {intent:?}");
        let outcome = self.controller.dispatch(intent);
        let result = match outcome {
            Ok(effects) => {
                self.run(effects).await;
                Ok(())
            }
            Err(e) => {
                debug!("Intent rejected: {e}");
                Err(e)
            }
        };
        self.publish();
        result
    }

    /// Waits for the next spawned operation to finish and applies it.
    /// Returns `false` when nothing is in flight.
    pub async fn next_completion(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        let Some(completion) = self.completions_rx.recv().await else {
            return false;
        };
        self.in_flight -= 1;
        let effects = self.controller.complete(completion);
        self.run(effects).await;
        self.publish();
        true
    }

    pub async fn run_until_idle(&mut self) {
        while self.next_completion().await {}
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.controller.view());
    }

    async fn run(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Call { request, call } => self.spawn_call(request, call),
                Effect::Listen { request, language } => {
                    if self.coordinator.can_listen(self.controller.settings()) {
                        let recognizer = self.coordinator.recognizer();
                        self.spawn(
                            async move {
                                Completion::Transcribed { request, result: recognizer.listen(language).await }
                            },
                            move |message| Completion::Transcribed {
                                request,
                                result: Err(SideEffectError::Failed { channel: "speech recognition", message }),
                            },
                        );
                    } else {
                        let completion = Completion::Transcribed {
                            request,
                            result: Err(SideEffectError::Unsupported { channel: "speech recognition" }),
                        };
                        queue.extend(self.controller.complete(completion));
                    }
                }
                Effect::Cue(cue) => self.coordinator.play_cue(cue, self.controller.settings()),
                Effect::Speak { text, language } => {
                    self.coordinator.speak(&text, language, self.controller.settings())
                }
                Effect::StopSpeech => self.coordinator.stop_speaking(),
                Effect::PersistSettings(settings) => self.persist(&settings).await,
                Effect::WriteExport(file) => {
                    let completion = Completion::ExportWritten { result: self.write_export(file).await };
                    queue.extend(self.controller.complete(completion));
                }
            }
        }
    }

    fn spawn_call(&mut self, request: RequestId, call: ApiCall) {
        let api = Arc::clone(&self.api);
        let fallback = call.clone();
        self.spawn(
            async move { perform(api.as_ref(), request, call).await },
            move |message| abandoned(request, fallback, ClientError::Task { message }),
        );
    }

    /// Runs `task` in the background. Every spawned task reports exactly one
    /// completion; if it panics, `on_panic` builds the failure instead.
    fn spawn<F, P>(&mut self, task: F, on_panic: P)
    where
        F: std::future::Future<Output = Completion> + Send + 'static,
        P: FnOnce(String) -> Completion + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let completion = match tokio::spawn(task).await {
                Ok(completion) => completion,
                Err(e) => {
                    error!("Background task failed: {e}");
                    on_panic(e.to_string())
                }
            };
            // The receiver lives as long as the driver.
            let _ = tx.send(completion);
        });
    }

    async fn persist(&self, settings: &Settings) {
        let Some(store) = &self.settings_store else {
            return;
        };
        if let Err(e) = store.save(settings).await {
            warn!("Failed to persist settings to {}: {e}", store.path().display());
        }
    }

    async fn write_export(&self, file: ExportFile) -> Result<PathBuf, ClientError> {
        let path = self.export_dir.join(&file.file_name);
        tokio::fs::write(&path, file.contents).await.map_err(|e| {
            error!("Failed to write export {}: {e}", path.display());
            e
        })?;
        Ok(path)
    }
}

/// Executes one API call and wraps its result for the controller.
async fn perform(api: &dyn ConversationApi, request: RequestId, call: ApiCall) -> Completion {
    match call {
        ApiCall::CreateConversation => Completion::ConversationCreated {
            request,
            result: api.create_conversation().await,
        },
        ApiCall::GetConversation { conversation_id } => {
            let result = api.get_conversation(&conversation_id).await;
            Completion::HistoryLoaded { request, conversation_id, result }
        }
        ApiCall::SendMessage { conversation_id, text, image } => {
            let result = api.send_message(&conversation_id, &text, image.as_deref()).await;
            Completion::MessageSent { request, conversation_id, result }
        }
        ApiCall::GetSentiment { conversation_id } => {
            let result = api.get_conversation_sentiment(&conversation_id).await;
            Completion::SummaryLoaded { request, conversation_id, result }
        }
        ApiCall::DeleteConversation { conversation_id } => {
            let result = api.delete_conversation(&conversation_id).await;
            Completion::ConversationDeleted { request, conversation_id, result }
        }
    }
}

/// The failed completion for a call whose task never returned.
fn abandoned(request: RequestId, call: ApiCall, error: ClientError) -> Completion {
    match call {
        ApiCall::CreateConversation => Completion::ConversationCreated { request, result: Err(error) },
        ApiCall::GetConversation { conversation_id } => {
            Completion::HistoryLoaded { request, conversation_id, result: Err(error) }
        }
        ApiCall::SendMessage { conversation_id, .. } => {
            Completion::MessageSent { request, conversation_id, result: Err(error) }
        }
        ApiCall::GetSentiment { conversation_id } => {
            Completion::SummaryLoaded { request, conversation_id, result: Err(error) }
        }
        ApiCall::DeleteConversation { conversation_id } => {
            Completion::ConversationDeleted { request, conversation_id, result: Err(error) }
        }
    }
}
