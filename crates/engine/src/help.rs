//! Help overlay shown above the dashboard while it is active.

/// Layout-specific help content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelpText {
    pub snippet: Option<&'static str>,
    pub details: &'static [&'static str],
}

pub const HELP_TITLE: &str = "Dashboard Help";
pub const DEFAULT_SNIPPET: &str = "Lay out notebook cells as a dashboard.";
/// Details every layout shares; layout details go before these.
pub const BASE_DETAILS: &[&str] = &[
    "Preview hides the layout controls to show the dashboard as viewers will see it.",
    "Notebook returns to the linear notebook view. Layout changes are kept in the notebook metadata.",
];

/// One rendered overlay. A new one (with a new id) is built on every
/// dashboard entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpOverlay {
    id: u64,
    pub title: &'static str,
    pub snippet: String,
    pub details: Vec<String>,
}

impl HelpOverlay {
    pub fn build(id: u64, layout: Option<HelpText>) -> Self {
        let mut snippet = DEFAULT_SNIPPET.to_string();
        let mut details = Vec::new();
        if let Some(help) = layout {
            if let Some(s) = help.snippet {
                snippet = s.to_string();
            }
            details.extend(help.details.iter().map(|d| d.to_string()));
        }
        details.extend(BASE_DETAILS.iter().map(|d| d.to_string()));
        Self {
            id,
            title: HELP_TITLE,
            snippet,
            details,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}
