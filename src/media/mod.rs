//! Media resource abstraction.
//!
//! The controller never decodes audio itself. It drives a [`MediaElement`]
//! and reacts to the [`MediaEvent`]s it emits; a [`PageHost`] hands out the
//! element and its control affordance.

pub mod element;
pub mod page;
pub mod simulated;

pub use element::{MediaElement, MediaError, MediaEvent, MediaSource, Preload};
pub use page::{ControlAffordance, ControlButton, Document, PageHost, SpeakerIcon};
pub use simulated::SimulatedMedia;
