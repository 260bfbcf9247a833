//! Dock icons shared by both render surfaces.
//!
//! The live surface shows the icon kind as a marker; the export embeds the
//! SVG as a base64 data URI so the document needs no external files.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use courtroom_engine::domain::{DockItem, Stage};

/// Which icon a dock bubble carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IconKind {
    Interruption,
    CriticalInitial,
    CriticalUrgent,
}

impl IconKind {
    pub const ALL: [IconKind; 3] = [
        IconKind::Interruption,
        IconKind::CriticalInitial,
        IconKind::CriticalUrgent,
    ];

    pub fn for_item(item: &DockItem) -> Self {
        match (item.is_critical(), item.stage) {
            (false, _) => IconKind::Interruption,
            (true, Stage::Initial) => IconKind::CriticalInitial,
            (true, Stage::Urgent) => IconKind::CriticalUrgent,
        }
    }

    /// Key under which the export script looks the icon up.
    pub fn name(self) -> &'static str {
        match self {
            IconKind::Interruption => "interruption",
            IconKind::CriticalInitial => "criticalInitial",
            IconKind::CriticalUrgent => "criticalUrgent",
        }
    }

    /// One-glyph marker for the text surface.
    pub fn marker(self) -> &'static str {
        match self {
            IconKind::Interruption => "-",
            IconKind::CriticalInitial => "!",
            IconKind::CriticalUrgent => "‼",
        }
    }

    pub fn fill(self) -> &'static str {
        match self {
            IconKind::Interruption => "#9ca3af",
            IconKind::CriticalInitial => "#f59e0b",
            IconKind::CriticalUrgent => "#ef4444",
        }
    }

    pub fn svg(self) -> String {
        let glyph = match self {
            IconKind::Interruption => {
                "<path d='M7 12h10' stroke='#fff' stroke-width='2' stroke-linecap='round'/>"
                    .to_string()
            }
            IconKind::CriticalInitial | IconKind::CriticalUrgent => {
                "<path d='M12 7v6' stroke='#fff' stroke-width='2' stroke-linecap='round'/>\
                 <circle cx='12' cy='16' r='1.4' fill='#fff'/>"
                    .to_string()
            }
        };
        format!(
            "<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 24 24'>\
             <circle cx='12' cy='12' r='10' fill='{}'/>{}</svg>",
            self.fill(),
            glyph
        )
    }

    pub fn data_uri(self) -> String {
        format!("data:image/svg+xml;base64,{}", STANDARD.encode(self.svg()))
    }
}

/// `{ name: dataUri }` for every icon, in a fixed order.
pub fn icon_map() -> serde_json::Map<String, serde_json::Value> {
    IconKind::ALL
        .iter()
        .map(|k| (k.name().to_string(), serde_json::Value::String(k.data_uri())))
        .collect()
}
