//! Page-level events the controller listens to.

/// Something that happened to the page (as opposed to the media element)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// The play/pause affordance was clicked
    ControlClicked,
    /// A link was clicked; `href` is empty when the target has none
    LinkClicked { href: String },
    FormSubmitted,
    /// Back/forward navigation
    HistoryNavigated,
    VisibilityChanged { hidden: bool },
    BeforeUnload,
    Focus,
    Blur,
}

impl PageEvent {
    /// Whether a link click leaves the current document
    pub fn is_outbound_navigation(&self) -> bool {
        match self {
            PageEvent::LinkClicked { href } => !href.is_empty() && !href.contains('#'),
            _ => false,
        }
    }
}
