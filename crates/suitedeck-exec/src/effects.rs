use std::collections::VecDeque;

use suitedeck_core::boot_effects;
use suitedeck_core::reduce;
use suitedeck_core::Gate;
use suitedeck_core::PanelAction;
use suitedeck_core::PanelEffect;
use suitedeck_core::PanelState;
use suitedeck_core::RuntimeAction;

use crate::backend::ConsoleBackend;
use crate::dispatcher::Dispatcher;
use crate::stream::pump;

/// Performs backend effects, reporting every outcome through `emit`.
/// Effects that belong to the host (opening a log, the clipboard) come back
/// untouched.
pub fn perform<B, F>(
    backend: &B,
    gate: &Gate,
    chunk_bytes: usize,
    effect: PanelEffect,
    mut emit: F,
) -> Option<PanelEffect>
where
    B: ConsoleBackend + ?Sized,
    F: FnMut(RuntimeAction),
{
    match effect {
        PanelEffect::FetchVocabulary => emit(match backend.vocabulary() {
            Ok(tags) => RuntimeAction::VocabularyLoaded(tags),
            Err(err) => {
                tracing::warn!(%err, "tag vocabulary unavailable");
                RuntimeAction::VocabularyFailed(err.operator_message())
            }
        }),
        PanelEffect::FetchRoots => match backend.roots() {
            Ok(roots) => emit(RuntimeAction::RootsLoaded(roots)),
            Err(err) => tracing::warn!(%err, "roots unavailable"),
        },
        PanelEffect::FetchListing { path } => emit(match backend.list_directory(&path) {
            Ok(listing) => RuntimeAction::ListingLoaded(listing),
            Err(err) => RuntimeAction::ListingFailed {
                path,
                message: err.operator_message(),
            },
        }),
        PanelEffect::FetchDeclaredTags { file } => emit(match backend.declared_tags(&file) {
            Ok(tags) => RuntimeAction::DeclaredTagsLoaded { file, tags },
            Err(err) => RuntimeAction::DeclaredTagsFailed {
                file,
                message: err.operator_message(),
            },
        }),
        PanelEffect::FetchFileContent { file } => emit(match backend.file_content(&file) {
            Ok(content) => RuntimeAction::FileContentLoaded { file, content },
            Err(err) => RuntimeAction::FileContentFailed {
                file,
                message: err.operator_message(),
            },
        }),
        PanelEffect::CheckEnvironment => emit(match backend.check_environment() {
            Ok(report) => RuntimeAction::EnvironmentChecked(report),
            Err(err) => {
                tracing::warn!(%err, "environment check failed");
                RuntimeAction::EnvironmentCheckFailed(err.operator_message())
            }
        }),
        PanelEffect::DispatchRun {
            file,
            tag,
            available_tags,
        } => {
            let dispatcher = Dispatcher::new(backend, gate);
            emit(match dispatcher.run_one(&file, &tag, &available_tags) {
                Ok(record) => RuntimeAction::RunSucceeded(record),
                Err(err) => RuntimeAction::RunFailed(err.into()),
            });
        }
        PanelEffect::FetchRegressionCount => match backend.regression_count() {
            Ok(count) => emit(RuntimeAction::RegressionCountLoaded(count)),
            Err(err) => tracing::debug!(%err, "regression count unavailable"),
        },
        PanelEffect::OpenStream { kind } => match backend.open_stream(kind) {
            Ok(reader) => {
                emit(RuntimeAction::StreamOpened);
                pump(reader, chunk_bytes, emit);
            }
            Err(err) => {
                tracing::warn!(%err, kind = kind.label(), "console stream refused");
                emit(RuntimeAction::StreamOpenFailed(err.operator_message()));
            }
        },
        PanelEffect::FetchRunHistory => emit(match backend.run_history() {
            Ok(runs) => RuntimeAction::RunHistoryLoaded(runs),
            Err(err) => RuntimeAction::RunHistoryFailed(err.operator_message()),
        }),
        host @ (PanelEffect::OpenLog { .. } | PanelEffect::CopyToClipboard(_)) => {
            return Some(host)
        }
    }
    None
}

/// Single owner of the panel state, driving it synchronously against a backend.
pub struct Controller<B> {
    backend: B,
    state: PanelState,
    chunk_bytes: usize,
}

impl<B: ConsoleBackend> Controller<B> {
    pub fn new(backend: B, state: PanelState, chunk_bytes: usize) -> Self {
        Self {
            backend,
            state,
            chunk_bytes,
        }
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Loads vocabulary, roots and the first listing.
    pub fn boot(&mut self) -> Vec<PanelEffect> {
        self.settle(boot_effects())
    }

    /// Reduces `action` and every follow-up until nothing is pending. Returns
    /// host effects in the order they were raised.
    pub fn dispatch(&mut self, action: PanelAction) -> Vec<PanelEffect> {
        let effects = reduce(&mut self.state, action);
        self.settle(effects)
    }

    /// Like [`Controller::dispatch`], also handing each runtime action to
    /// `observe` after it is reduced, so callers can follow a stream live.
    pub fn dispatch_observed<F>(&mut self, action: PanelAction, mut observe: F) -> Vec<PanelEffect>
    where
        F: FnMut(&PanelState, &RuntimeAction),
    {
        let effects = reduce(&mut self.state, action);
        self.settle_with(effects, &mut observe)
    }

    fn settle(&mut self, effects: Vec<PanelEffect>) -> Vec<PanelEffect> {
        self.settle_with(effects, &mut |_, _| {})
    }

    fn settle_with(
        &mut self,
        effects: Vec<PanelEffect>,
        observe: &mut dyn FnMut(&PanelState, &RuntimeAction),
    ) -> Vec<PanelEffect> {
        let mut pending: VecDeque<PanelEffect> = effects.into();
        let mut host = Vec::new();
        while let Some(effect) = pending.pop_front() {
            let gate = self.state.gate.clone();
            let state = &mut self.state;
            let mut follow_ups = Vec::new();
            let emit = |action: RuntimeAction| {
                follow_ups.extend(reduce(state, PanelAction::Runtime(action.clone())));
                observe(state, &action);
            };
            if let Some(effect) = perform(&self.backend, &gate, self.chunk_bytes, effect, emit) {
                host.push(effect);
            }
            pending.extend(follow_ups);
        }
        host
    }
}
