#![forbid(unsafe_code)]

pub mod block;
pub mod catalog;
pub mod compositor;
pub mod core;
pub mod document;
pub mod error;
pub mod filter_cpu;
pub mod history;
pub mod interact;
pub mod label;
pub mod labs;
pub mod prompt;
pub mod resolve;
pub mod schema;
pub mod service;
pub mod session;
pub mod store;
pub mod text_cpu;
pub mod transform_cpu;

pub use block::{BlockState, CustomProperty, CustomPropertyKind, SectionState};
pub use catalog::default_registry;
pub use compositor::{Compositor, RenderOpts};
pub use core::{AspectRatio, BlockId, Canvas, Frame};
pub use document::{Document, Project};
pub use error::{MuralError, MuralResult};
pub use history::{History, HistoryEntry, change_summary};
pub use interact::{DragOutcome, DragSession, DragState};
pub use label::smart_label;
pub use labs::{FilterSettings, LabsState, TextOverlay, TransformSettings};
pub use prompt::{CompileOpts, compile};
pub use resolve::{compute_effective_blocks, first_active, is_section_visible};
pub use schema::{
    BlockDefinition, Condition, FieldDefinition, FieldType, FieldValue, SchemaRegistry,
    SectionDefinition,
};
pub use service::{GenerateRequest, ImageService, SuggestionService, with_retry};
pub use session::{Debounce, EditorSession, GenerationTicket};
pub use store::{BlockStore, Scope, Selection, StoreNotice};
pub use text_cpu::{FontLibrary, OverlayMetrics, TextRenderer};
