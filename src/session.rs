//! Editing session for one document: serializes generation requests,
//! guards against stale async results, and debounces suggestion fetches.
//!
//! The session is single-writer by construction. Long-latency work is
//! modeled as begin/complete pairs so the owning event loop can run the
//! external call however it likes; the session only decides whether the
//! result is still wanted when it lands.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    block::BlockState,
    core::Frame,
    document::Document,
    error::{MuralError, MuralResult},
    history::change_summary,
    prompt::{CompileOpts, compile},
    resolve::compute_effective_blocks,
    schema::SchemaRegistry,
    service::{GenerateRequest, ImageService},
    store::BlockStore,
};

/// Token for one generation attempt. A result is applied only if its
/// ticket is still the newest one the session issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationTicket(u64);

#[derive(Debug, Default)]
struct TicketCounter {
    current: u64,
}

impl TicketCounter {
    fn issue(&mut self) -> GenerationTicket {
        self.current += 1;
        GenerationTicket(self.current)
    }

    fn supersede(&mut self) {
        self.current += 1;
    }

    fn is_current(&self, ticket: GenerationTicket) -> bool {
        ticket.0 == self.current
    }
}

/// Trailing-edge debounce with injected time, so tests never sleep.
/// Re-scheduling replaces the pending deadline.
#[derive(Clone, Copy, Debug)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True exactly once per schedule, when the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Recommended delay before firing suggestion fetches off free-text edits.
pub const SUGGESTION_DEBOUNCE: Duration = Duration::from_secs(2);

pub struct EditorSession<S: ImageService> {
    registry: Arc<SchemaRegistry>,
    store: BlockStore,
    document: Document,
    service: S,
    tickets: TicketCounter,
    busy: bool,
    suggestions: Debounce,
}

impl<S: ImageService> EditorSession<S> {
    pub fn new(registry: Arc<SchemaRegistry>, document: Document, service: S) -> Self {
        let mut store = BlockStore::new(registry.clone());
        store.replace_locals(document.blocks.clone());
        Self {
            registry,
            store,
            document,
            service,
            tickets: TicketCounter::default(),
            busy: false,
            suggestions: Debounce::new(SUGGESTION_DEBOUNCE),
        }
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut BlockStore {
        &mut self.store
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn set_base_style(&mut self, style: impl Into<String>, use_it: bool) {
        self.document.base_style = style.into();
        self.document.use_base_style = use_it;
    }

    pub fn set_globals(&mut self, globals: Vec<BlockState>) {
        self.store.replace_globals(globals);
    }

    /// Current prompt for preview. Pure; safe to call on every change.
    pub fn prompt(&self) -> String {
        let effective = compute_effective_blocks(
            self.store.locals(),
            self.store.globals(),
            self.document.use_base_style,
            &self.registry,
        );
        compile(
            &effective,
            &self.registry,
            &CompileOpts {
                base_style: &self.document.base_style,
                use_base_style: self.document.use_base_style,
                aspect_ratio: self.document.aspect_ratio,
            },
        )
    }

    /// Any user edit supersedes whatever generation may be in flight, so
    /// its result will be dropped on arrival. Called by the owning loop
    /// after store mutations.
    pub fn note_edit(&mut self) {
        self.tickets.supersede();
        self.document.blocks = self.store.locals().to_vec();
    }

    /// Start a generation. At most one may be in flight per document.
    pub fn begin_generation(&mut self) -> MuralResult<(GenerationTicket, GenerateRequest)> {
        if self.busy {
            return Err(MuralError::rejected("a generation is already in flight"));
        }
        let effective = compute_effective_blocks(
            self.store.locals(),
            self.store.globals(),
            self.document.use_base_style,
            &self.registry,
        );
        let request = GenerateRequest::new(
            self.prompt(),
            self.document.seed,
            self.document.aspect_ratio,
        )
        .with_block_references(&effective);
        let request = match &self.document.preview_image {
            Some(image) => request.with_previous_image(image.clone()),
            None => request,
        };
        self.busy = true;
        Ok((self.tickets.issue(), request))
    }

    /// Convenience path for synchronous callers: begin, call the service,
    /// complete.
    pub fn generate(&mut self) -> MuralResult<Option<Frame>> {
        let (ticket, request) = self.begin_generation()?;
        let result = self.service.generate(&request);
        self.complete_generation(ticket, result)
    }

    /// Land a generation result. Returns `Ok(None)` when the ticket was
    /// superseded and the result discarded; otherwise records a history
    /// snapshot labeled by the block diff since the previous snapshot.
    #[tracing::instrument(skip(self, result))]
    pub fn complete_generation(
        &mut self,
        ticket: GenerationTicket,
        result: MuralResult<Frame>,
    ) -> MuralResult<Option<Frame>> {
        self.busy = false;
        if !self.tickets.is_current(ticket) {
            tracing::debug!("discarding superseded generation result");
            return Ok(None);
        }
        let frame = result?;

        self.document.blocks = self.store.locals().to_vec();
        let previous = self
            .document
            .history
            .entries()
            .first()
            .map(|e| e.blocks.clone())
            .unwrap_or_default();
        let action = change_summary(&previous, &self.document.blocks, &self.registry);
        self.document.snapshot(action);
        Ok(Some(frame))
    }

    /// Revert to a history entry. Not itself historized; supersedes any
    /// in-flight generation.
    pub fn restore_entry(&mut self, index: usize) -> MuralResult<()> {
        let entry = self
            .document
            .history
            .get(index)
            .cloned()
            .ok_or_else(|| MuralError::rejected("no such history entry"))?;
        self.document.restore(&entry);
        self.store.replace_locals(entry.blocks);
        self.tickets.supersede();
        Ok(())
    }

    /// Free-text edits schedule a trailing-edge suggestion fetch.
    pub fn note_typing(&mut self, now: Instant) {
        self.suggestions.schedule(now);
    }

    /// True when the debounce elapsed and a suggestion fetch should run.
    pub fn suggestions_due(&mut self, now: Instant) -> bool {
        self.suggestions.fire(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::default_registry,
        schema::FieldValue,
        store::Scope,
    };

    struct StubService;

    impl ImageService for StubService {
        fn generate(&self, _request: &GenerateRequest) -> MuralResult<Frame> {
            Ok(Frame::new(2, 2))
        }
    }

    fn session() -> EditorSession<StubService> {
        let registry = Arc::new(default_registry().unwrap());
        EditorSession::new(registry, Document::default(), StubService)
    }

    #[test]
    fn only_one_generation_in_flight() {
        let mut s = session();
        let (_ticket, _request) = s.begin_generation().unwrap();
        assert!(matches!(
            s.begin_generation(),
            Err(MuralError::Rejected(_))
        ));
    }

    #[test]
    fn superseded_results_are_discarded() {
        let mut s = session();
        let (ticket, _request) = s.begin_generation().unwrap();
        // The user keeps editing while the call is out.
        s.store_mut().add_block(Scope::Local, "Subject").unwrap();
        s.note_edit();

        let landed = s.complete_generation(ticket, Ok(Frame::new(2, 2))).unwrap();
        assert!(landed.is_none());
        assert!(s.document().history.is_empty());
        assert!(!s.is_busy());
    }

    #[test]
    fn successful_generation_snapshots_with_diff_label() {
        let mut s = session();
        let (id, _) = s.store_mut().add_block(Scope::Local, "Subject").unwrap();
        {
            let mut block = s.store().get(id).cloned().unwrap();
            if let Some(section) = block.section_mut("identity") {
                section.set_field("role", FieldValue::text("Detective"));
            }
            s.store_mut().update_block(block).unwrap();
        }

        let frame = s.generate().unwrap();
        assert!(frame.is_some());
        assert_eq!(s.document().history.len(), 1);
        assert_eq!(s.document().history.entries()[0].action, "Added Detective");

        // No edits: the next generation is labeled a regeneration.
        let frame = s.generate().unwrap();
        assert!(frame.is_some());
        assert_eq!(s.document().history.entries()[0].action, "Regenerated");
    }

    #[test]
    fn restore_syncs_store_and_skips_history() {
        let mut s = session();
        s.store_mut().add_block(Scope::Local, "Subject").unwrap();
        s.generate().unwrap();
        assert_eq!(s.document().history.len(), 1);

        s.store_mut().add_block(Scope::Local, "Lighting").unwrap();
        s.note_edit();
        assert_eq!(s.store().locals().len(), 2);

        s.restore_entry(0).unwrap();
        assert_eq!(s.store().locals().len(), 1);
        assert_eq!(s.document().history.len(), 1);
    }

    #[test]
    fn restore_rejects_bad_index() {
        let mut s = session();
        assert!(matches!(s.restore_entry(3), Err(MuralError::Rejected(_))));
    }

    #[test]
    fn debounce_fires_once_on_trailing_edge() {
        let start = Instant::now();
        let mut d = Debounce::new(Duration::from_secs(2));
        assert!(!d.fire(start));

        d.schedule(start);
        assert!(!d.fire(start + Duration::from_secs(1)));
        // A new keystroke pushes the deadline out.
        d.schedule(start + Duration::from_secs(1));
        assert!(!d.fire(start + Duration::from_secs(2)));
        assert!(d.fire(start + Duration::from_secs(3)));
        assert!(!d.fire(start + Duration::from_secs(4)));
    }
}
