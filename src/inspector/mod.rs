//! Inspector sessions: the per-entity adapter between form input and the
//! autosave engine.
//!
//! A session owns the editable form state of the open record, the focus/IME
//! tracker and the debounce windows of the free-text fields. It turns raw
//! input into canonical patches and hands them to the shared
//! [`AutosaveEngine`].

pub mod project;
pub mod task;

use crate::core::{AutosaveError, EntityId, EntityKind, Patch, Result};
use crate::entity::EditableKind;
use crate::interaction::{InteractionEffect, TextField, TextInteractionTracker};
use crate::normalize::{
    CustomFieldFormItem, LinkFormItem, are_custom_field_lists_equal, are_link_lists_equal,
    build_local_links, find_invalid_custom_field_index, find_invalid_link_index,
    is_local_link_id, next_custom_field_rank, normalize_custom_field_list, normalize_link_list,
    normalize_optional_text, normalize_tag_list, to_custom_field_form_items, to_link_form_items,
};
use crate::policy::AutosavePolicy;
use crate::queue::{AutosaveEngine, EngineParts, ProcessOutcome};
use crate::save_state::SaveStatus;
use crate::scheduler::DebounceScheduler;
use crate::store::{ChangeNotifier, InspectorStore, RecordStore};
use std::sync::Arc;
use tracing::{Level, event};

pub use project::collect_descendant_ids;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMode {
    /// A debounce window elapsed; interaction gates apply.
    Debounced,
    /// Blur, composition end, explicit actions and flushes.
    Immediate,
}

/// What happened to a requested change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// A patch was handed to the engine.
    Staged,
    /// The value equals what the record already holds.
    Unchanged,
    /// Nothing to do: no record open, autosave gated, or the action was refused.
    Skipped,
    /// A list row failed validation; the matching validation index is set.
    Invalid { index: usize },
}

enum FieldPatch<K: EntityKind> {
    Ready { wire: Patch<K>, local: Patch<K> },
    Rejected(StageOutcome),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FormState {
    title: String,
    note: String,
    tags: Vec<String>,
    links: Vec<LinkFormItem>,
    custom_fields: Vec<CustomFieldFormItem>,
    link_validation_error: Option<usize>,
    custom_field_validation_error: Option<usize>,
}

pub struct InspectorSession<K: EditableKind> {
    engine: AutosaveEngine<K>,
    store: Arc<InspectorStore<K>>,
    tracker: TextInteractionTracker,
    scheduler: DebounceScheduler<TextField>,
    form: FormState,
    entity_id: Option<EntityId>,
}

impl<K: EditableKind> InspectorSession<K> {
    /// Builds a session over an engine whose local store and active-entity
    /// source are `store`.
    pub fn new(engine: AutosaveEngine<K>, store: Arc<InspectorStore<K>>) -> Self {
        let scheduler = DebounceScheduler::from_policy(engine.policy());
        Self {
            engine,
            store,
            tracker: TextInteractionTracker::new(),
            scheduler,
            form: FormState::default(),
            entity_id: None,
        }
    }

    /// Wires a fresh [`InspectorStore`] and engine around `remote`.
    pub fn connect(
        remote: Arc<dyn RecordStore<K>>,
        notifier: Arc<dyn ChangeNotifier>,
        policy: AutosavePolicy,
    ) -> Result<Self> {
        let store = Arc::new(InspectorStore::<K>::new());
        let parts = EngineParts::new(remote, store.clone(), store.clone()).notifier(notifier);
        let engine = AutosaveEngine::new(parts, policy)?;
        Ok(Self::new(engine, store))
    }

    pub fn engine(&self) -> &AutosaveEngine<K> {
        &self.engine
    }

    pub fn store(&self) -> &Arc<InspectorStore<K>> {
        &self.store
    }

    pub fn tracker(&self) -> &TextInteractionTracker {
        &self.tracker
    }

    pub fn entity_id(&self) -> Option<&EntityId> {
        self.entity_id.as_ref()
    }

    /// The record as the local cache holds it.
    pub fn record(&self) -> Option<K::Record> {
        self.store.current()
    }

    pub fn title_input(&self) -> &str {
        &self.form.title
    }

    pub fn note_input(&self) -> &str {
        &self.form.note
    }

    pub fn tags(&self) -> &[String] {
        &self.form.tags
    }

    pub fn links(&self) -> &[LinkFormItem] {
        &self.form.links
    }

    pub fn custom_fields(&self) -> &[CustomFieldFormItem] {
        &self.form.custom_fields
    }

    pub fn link_validation_error(&self) -> Option<usize> {
        self.form.link_validation_error
    }

    pub fn custom_field_validation_error(&self) -> Option<usize> {
        self.form.custom_field_validation_error
    }

    /// The first outstanding list validation failure, links before custom fields.
    pub fn validation_error(&self) -> Option<AutosaveError> {
        let (field, index) = match (
            self.form.link_validation_error,
            self.form.custom_field_validation_error,
        ) {
            (Some(index), _) => ("links", index),
            (None, Some(index)) => ("customFields", index),
            (None, None) => return None,
        };
        Some(AutosaveError::Validation {
            field: field.to_string(),
            index,
        })
    }

    pub fn save_status(&self) -> SaveStatus {
        self.engine.save_status()
    }

    /// Shows `record`.
    ///
    /// Another entity resets the whole form and drops pending work of every
    /// other entity without flushing it. The same entity refreshes the form
    /// from the fresher copy, except fields the user is typing in.
    pub fn open(&mut self, record: K::Record) -> Result<()> {
        let next = K::record_id(&record).clone();
        if self.entity_id.as_ref() == Some(&next) && self.store.is_open() {
            self.store.replace(record.clone())?;
            self.sync_from_record(&record, false);
            return Ok(());
        }

        let previous = self.entity_id.take();
        self.engine.on_context_change(previous.as_ref(), Some(&next));
        self.scheduler.cancel_all();
        self.tracker.reset();
        self.store.open(record.clone())?;
        self.entity_id = Some(next);
        self.sync_from_record(&record, true);
        Ok(())
    }

    /// Flushes and hides the record. Work for it that a running loop has not
    /// reached yet still commits; work for any other entity is dropped.
    pub async fn close(&mut self) -> Result<ProcessOutcome> {
        let outcome = self.flush_pending().await;
        self.tracker.reset();
        self.scheduler.cancel_all();
        self.store.close()?;
        self.engine.clear_inactive();
        Ok(outcome)
    }

    /// Replaces the form from `record`. On refresh, only fields that are not
    /// being edited or composed are overwritten.
    fn sync_from_record(&mut self, record: &K::Record, reset: bool) {
        let overwrite = |field| reset || !self.tracker.is_interacting(field);
        let title = overwrite(TextField::Title);
        let note = overwrite(TextField::Note);
        let links = overwrite(TextField::Links);
        let custom_fields = overwrite(TextField::CustomFields);

        if title {
            self.form.title = K::title(record).to_string();
        }
        if note {
            self.form.note = K::note(record).unwrap_or_default().to_string();
        }
        if links {
            self.form.links = to_link_form_items(K::links(record));
        }
        if custom_fields {
            self.form.custom_fields = to_custom_field_form_items(K::custom_fields(record));
        }
        self.form.tags = K::tags(record).to_vec();

        if reset {
            self.form.link_validation_error = None;
            self.form.custom_field_validation_error = None;
        }
    }

    pub fn set_title_input(&mut self, title: impl Into<String>) {
        self.form.title = title.into();
        self.touch(TextField::Title);
    }

    pub fn set_note_input(&mut self, note: impl Into<String>) {
        self.form.note = note.into();
        self.touch(TextField::Note);
    }

    pub fn set_links(&mut self, links: Vec<LinkFormItem>) {
        self.form.links = links;
        self.touch(TextField::Links);
    }

    pub fn set_custom_fields(&mut self, fields: Vec<CustomFieldFormItem>) {
        self.form.custom_fields = fields;
        self.touch(TextField::CustomFields);
    }

    /// Opens or extends the debounce window of `field`. Programmatic changes
    /// made under [`with_autosave_suppressed`](Self::with_autosave_suppressed)
    /// do not open one.
    fn touch(&mut self, field: TextField) {
        if !self.tracker.is_suppressed() {
            self.scheduler.schedule(field);
        }
    }

    /// Runs `f` with debounced autosave switched off.
    pub fn with_autosave_suppressed<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let was_suppressed = self.tracker.is_suppressed();
        self.tracker.set_suppressed(true);
        let result = f(self);
        self.tracker.set_suppressed(was_suppressed);
        result
    }

    // Entering focus or a composition never flushes.
    pub fn on_focus(&mut self, field: TextField) {
        let _ = self.tracker.mark_editing(field);
    }

    pub fn on_composition_start(&mut self, field: TextField) {
        let _ = self.tracker.mark_composing(field);
    }

    pub async fn on_blur(&mut self, field: TextField) -> Option<ProcessOutcome> {
        let effect = self.tracker.mark_edit_end(field);
        self.run_effect(effect).await
    }

    pub async fn on_composition_end(&mut self, field: TextField) -> Option<ProcessOutcome> {
        let effect = self.tracker.mark_composition_end(field);
        self.run_effect(effect).await
    }

    async fn run_effect(&mut self, effect: InteractionEffect) -> Option<ProcessOutcome> {
        match effect {
            InteractionEffect::None => None,
            InteractionEffect::FlushNow => Some(self.flush_pending().await),
        }
    }

    /// Waits for the next elapsed debounce window and stages that field.
    ///
    /// Returns `None` when no window is open.
    pub async fn pump_debounced(&mut self) -> Option<(TextField, StageOutcome)> {
        let field = self.scheduler.next_due().await?;
        let Some(entity_id) = self.entity_id.clone() else {
            return Some((field, StageOutcome::Skipped));
        };

        let outcome = match self.build_field_patch(field, StageMode::Debounced) {
            FieldPatch::Ready { wire, local } => {
                self.engine.enqueue_debounced(&entity_id, wire, local).await;
                StageOutcome::Staged
            }
            FieldPatch::Rejected(outcome) => outcome,
        };
        event!(
            Level::DEBUG,
            kind = K::KIND,
            field = %field,
            outcome = ?outcome,
            "debounce window elapsed"
        );
        Some((field, outcome))
    }

    /// Stages every free-text field immediately, then processes the queue once.
    pub async fn flush_pending(&mut self) -> ProcessOutcome {
        let Some(entity_id) = self.entity_id.clone() else {
            return ProcessOutcome::Drained {
                committed: 0,
                discarded: 0,
            };
        };
        if self.store.is_open() {
            self.scheduler.cancel_all();
            for field in TextField::ALL {
                if let FieldPatch::Ready { wire, local } =
                    self.build_field_patch(field, StageMode::Immediate)
                {
                    self.engine.stage(&entity_id, wire, local);
                }
            }
        }
        self.engine.process(&entity_id).await
    }

    /// Stages one free-text field now and processes the queue.
    pub async fn stage_field_now(&mut self, field: TextField) -> StageOutcome {
        let Some(entity_id) = self.entity_id.clone() else {
            return StageOutcome::Skipped;
        };
        self.scheduler.cancel(field);
        match self.build_field_patch(field, StageMode::Immediate) {
            FieldPatch::Ready { wire, local } => {
                self.engine.enqueue_immediate(&entity_id, wire, local).await;
                StageOutcome::Staged
            }
            FieldPatch::Rejected(outcome) => outcome,
        }
    }

    /// Commits an explicit single-field action (status, priority, ...).
    async fn commit_action(&mut self, wire: Patch<K>, local: Patch<K>) -> StageOutcome {
        let Some(entity_id) = self.entity_id.clone() else {
            return StageOutcome::Skipped;
        };
        self.engine.enqueue_immediate(&entity_id, wire, local).await;
        StageOutcome::Staged
    }

    /// The open record, if the inspector is showing one.
    fn open_record(&self) -> Option<K::Record> {
        if self.entity_id.is_none() || !self.store.is_open() {
            return None;
        }
        self.store.current()
    }

    fn build_field_patch(&mut self, field: TextField, mode: StageMode) -> FieldPatch<K> {
        let Some(record) = self.open_record() else {
            return FieldPatch::Rejected(StageOutcome::Skipped);
        };
        if mode == StageMode::Debounced {
            let links_being_edited =
                field == TextField::Links && self.tracker.is_interacting(TextField::Links);
            if self.tracker.should_skip_debounced_stage(field) || links_being_edited {
                return FieldPatch::Rejected(StageOutcome::Skipped);
            }
        }

        match field {
            TextField::Title => self.build_title_patch(&record),
            TextField::Note => self.build_note_patch(&record),
            TextField::Links => self.build_links_patch(&record),
            TextField::CustomFields => self.build_custom_fields_patch(&record),
        }
    }

    fn build_title_patch(&self, record: &K::Record) -> FieldPatch<K> {
        let title = self.form.title.trim();
        if title.is_empty() || title == K::title(record) {
            return FieldPatch::Rejected(StageOutcome::Unchanged);
        }
        let patch = Patch::new().with(K::title_value(title.to_string()));
        FieldPatch::Ready {
            wire: patch.clone(),
            local: patch,
        }
    }

    fn build_note_patch(&self, record: &K::Record) -> FieldPatch<K> {
        let note = normalize_optional_text(Some(self.form.note.as_str()));
        let current = K::note(record).filter(|note| !note.is_empty());
        if note.as_deref() == current {
            return FieldPatch::Rejected(StageOutcome::Unchanged);
        }
        let patch = Patch::new().with(K::note_value(note));
        FieldPatch::Ready {
            wire: patch.clone(),
            local: patch,
        }
    }

    fn build_links_patch(&mut self, record: &K::Record) -> FieldPatch<K> {
        if let Some(index) = find_invalid_link_index(&self.form.links) {
            self.form.link_validation_error = Some(index);
            return FieldPatch::Rejected(StageOutcome::Invalid { index });
        }
        self.form.link_validation_error = None;

        let next = normalize_link_list(&self.form.links);
        if are_link_lists_equal(&next, K::links(record)) {
            return FieldPatch::Rejected(StageOutcome::Unchanged);
        }

        let local = build_local_links(&next);
        // Temporary ids never reach the server.
        let wire = next
            .into_iter()
            .map(|mut link| {
                if link.id.as_deref().is_some_and(is_local_link_id) {
                    link.id = None;
                }
                link
            })
            .collect();
        FieldPatch::Ready {
            wire: Patch::new().with(K::links_value(wire)),
            local: Patch::new().with(K::links_value(local)),
        }
    }

    fn build_custom_fields_patch(&mut self, record: &K::Record) -> FieldPatch<K> {
        if let Some(index) = find_invalid_custom_field_index(&self.form.custom_fields) {
            self.form.custom_field_validation_error = Some(index);
            return FieldPatch::Rejected(StageOutcome::Invalid { index });
        }
        self.form.custom_field_validation_error = None;

        let next = normalize_custom_field_list(&self.form.custom_fields);
        if are_custom_field_lists_equal(&next, K::custom_fields(record)) {
            return FieldPatch::Rejected(StageOutcome::Unchanged);
        }
        let patch = Patch::new().with(K::custom_fields_value(next));
        FieldPatch::Ready {
            wire: patch.clone(),
            local: patch,
        }
    }

    /// Adds a trimmed tag unless it is empty or already present.
    pub async fn add_tag(&mut self, tag: &str) -> StageOutcome {
        let tag = tag.trim();
        if tag.is_empty() || self.form.tags.iter().any(|existing| existing == tag) {
            return StageOutcome::Skipped;
        }
        self.form.tags.push(tag.to_string());
        self.commit_tags().await
    }

    pub async fn remove_tag(&mut self, tag: &str) -> StageOutcome {
        let before = self.form.tags.len();
        self.form.tags.retain(|existing| existing != tag);
        if self.form.tags.len() == before {
            return StageOutcome::Skipped;
        }
        self.commit_tags().await
    }

    async fn commit_tags(&mut self) -> StageOutcome {
        let Some(record) = self.open_record() else {
            return StageOutcome::Skipped;
        };
        let tags = normalize_tag_list(&self.form.tags);
        if tags.as_slice() == K::tags(&record) {
            return StageOutcome::Unchanged;
        }
        let patch = Patch::new().with(K::tags_value(tags));
        self.commit_action(patch.clone(), patch).await
    }

    /// Appends a link row. Rows without a url are refused.
    pub async fn add_link(&mut self, link: LinkFormItem) -> StageOutcome {
        if link.url.trim().is_empty() {
            return StageOutcome::Skipped;
        }
        self.form.links.push(LinkFormItem {
            id: link.id,
            title: link.title.trim().to_string(),
            url: link.url.trim().to_string(),
            kind: link.kind,
        });
        self.stage_field_now(TextField::Links).await
    }

    pub async fn remove_link(&mut self, index: usize) -> StageOutcome {
        if index >= self.form.links.len() {
            return StageOutcome::Skipped;
        }
        self.form.links.remove(index);
        self.stage_field_now(TextField::Links).await
    }

    /// Appends a custom field after every existing row.
    pub async fn confirm_custom_field(&mut self, title: &str, value: &str) -> StageOutcome {
        let title = title.trim();
        if title.is_empty() {
            return StageOutcome::Skipped;
        }
        let rank = next_custom_field_rank(&self.form.custom_fields);
        self.form
            .custom_fields
            .push(CustomFieldFormItem::new(rank, title, value.trim()));
        self.stage_field_now(TextField::CustomFields).await
    }

    pub async fn remove_custom_field(&mut self, index: usize) -> StageOutcome {
        if index >= self.form.custom_fields.len() {
            return StageOutcome::Skipped;
        }
        self.form.custom_fields.remove(index);
        self.stage_field_now(TextField::CustomFields).await
    }

    /// Clears the link error; with an index, only if it points at that row.
    pub fn clear_link_validation_error(&mut self, index: Option<usize>) {
        if index.is_none() || self.form.link_validation_error == index {
            self.form.link_validation_error = None;
        }
    }

    pub fn clear_custom_field_validation_error(&mut self, index: Option<usize>) {
        if index.is_none() || self.form.custom_field_validation_error == index {
            self.form.custom_field_validation_error = None;
        }
    }

    pub async fn retry_save(&mut self) -> Option<ProcessOutcome> {
        self.engine.manual_retry().await
    }

    pub fn retry_available(&self) -> bool {
        self.engine.retry_available()
    }
}
