//! Self-contained HTML export.
//!
//! The document carries the scenario, the engine constants, every fallback
//! string and the icon data URIs as JSON literals inside one script, followed
//! by the script port of the engine. Nothing is fetched at play time except
//! background images that were not embedded.

use std::fs;
use std::path::{Component, Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tracing::{debug, warn};

use courtroom_engine::domain::{
    DEFAULT_BACKGROUND_URL, DEFAULT_COURT_BACKGROUND_URL, DEFAULT_PUNISHMENT, SUMMARY_TEMPLATES,
};
use courtroom_engine::timing::DEFAULT_TIMER_MINUTES;
use courtroom_engine::{EngineConstants, Scenario};

use crate::error::Result;
use crate::icons::icon_map;
use crate::live;

const TEMPLATE: &str = include_str!("../assets/export_template.html");
const ENGINE_JS: &str = include_str!("../assets/engine.js");
const PAGE_JS: &str = include_str!("../assets/page.js");

pub const DEFAULT_TITLE: &str = "Courtroom Scenario";

/// Render the export document for `scenario`.
pub fn export_html(scenario: &Scenario, constants: &EngineConstants) -> Result<String> {
    let title = scenario
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .map(|id| format!("{} · {}", DEFAULT_TITLE, id))
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let config = script_json(&serde_json::to_value(scenario)?)?;
    let constants = script_json(&injected_constants(constants)?)?;
    let icons = script_json(&Value::Object(icon_map()))?;
    let script = format!("{}\n{}", ENGINE_JS.trim_end(), PAGE_JS.trim_end());

    let html = fill_template(
        TEMPLATE,
        &[
            ("TITLE", &escape_html(&title)),
            ("CONFIG", &config),
            ("CONSTANTS", &constants),
            ("ICONS", &icons),
            ("ENGINE", &script),
        ],
    );
    debug!(bytes = html.len(), messages = scenario.messages.len(), "export rendered");
    Ok(html)
}

/// The page's engine without timers or DOM: the injected globals followed by
/// `createInitialState`, `applyAction` and `captureFrame`. Lets a plain
/// JavaScript runtime drive the same code the exported page runs.
pub fn headless_script(scenario: &Scenario, constants: &EngineConstants) -> Result<String> {
    Ok(format!(
        "const CONFIG = {};\nconst CONSTANTS = {};\nconst ICONS = {};\n{}",
        script_json(&serde_json::to_value(scenario)?)?,
        script_json(&injected_constants(constants)?)?,
        script_json(&Value::Object(icon_map()))?,
        ENGINE_JS.trim_end(),
    ))
}

/// Everything the script would otherwise hard-code.
pub fn injected_constants(constants: &EngineConstants) -> Result<Value> {
    Ok(json!({
        "constants": serde_json::to_value(constants)?,
        "defaults": {
            "punishment": DEFAULT_PUNISHMENT,
            "courtBackground": DEFAULT_COURT_BACKGROUND_URL,
            "background": DEFAULT_BACKGROUND_URL,
            "timerMinutes": DEFAULT_TIMER_MINUTES,
        },
        "labels": {
            "verdictTitle": live::VERDICT_TITLE,
            "punishment": live::PUNISHMENT_LABEL,
            "reason": live::REASON_LABEL,
            "returnToGame": live::RETURN_LABEL,
            "end": live::END_LABEL,
            "summaryTitle": live::SUMMARY_TITLE,
            "summary": SUMMARY_TEMPLATES,
            "interruption": live::INTERRUPTION_TITLE,
            "critical": live::CRITICAL_TITLE,
            "criticalTask": live::CRITICAL_TASK_TITLE,
            "toUrgent": live::TO_URGENT,
            "toCourt": live::TO_COURT,
        },
    }))
}

/// JSON that is safe to place inside a `<script>` element.
pub fn script_json(value: &Value) -> Result<String> {
    let raw = serde_json::to_string(value)?;
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    Ok(out)
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Single left-to-right pass over `{{NAME}}` placeholders. Substituted text is
/// never rescanned, so scenario content cannot smuggle in a placeholder.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let replaced = after.find("}}").and_then(|end| {
            let name = &after[..end];
            values
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| (*v, end + 2))
        });
        match replaced {
            Some((value, consumed)) => {
                out.push_str(value);
                rest = &after[consumed..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Image embedding
// ---------------------------------------------------------------------------

fn is_remote(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// `url` resolved under `root`. Only plain path segments are allowed, so
/// the result never leaves `root`.
fn contained_path(root: &Path, url: &str) -> Option<PathBuf> {
    let relative = Path::new(url.trim_start_matches('/'));
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| root.join(relative))
}

/// Data URI for a site-relative image under `root`, if the file exists.
fn local_data_uri(root: &Path, url: &str) -> Result<Option<String>> {
    if url.is_empty() || is_remote(url) {
        return Ok(None);
    }
    let Some(path) = contained_path(root, url) else {
        warn!(url, "image path escapes the embed root, left as a link");
        return Ok(None);
    };
    let Some(mime) = mime_for(&path) else {
        warn!(url, "not an image type that can be embedded");
        return Ok(None);
    };
    if !path.is_file() {
        warn!(url, path = %path.display(), "image not found, left as a link");
        return Ok(None);
    }
    let bytes = fs::read(&path)?;
    Ok(Some(format!("data:{};base64,{}", mime, STANDARD.encode(bytes))))
}

/// Embed site-relative background images found under `root` as data URIs.
/// Returns how many images were embedded.
pub fn embed_local_images(scenario: &mut Scenario, root: &Path) -> Result<usize> {
    let mut embedded = 0;

    if let Some(uri) = local_data_uri(root, &scenario.background_url)? {
        scenario.background_url_data_uri = Some(uri);
        embedded += 1;
    }

    for message in &mut scenario.messages {
        let Some(outcome) = message.court_outcome.as_mut() else {
            continue;
        };
        let Some(url) = outcome.background_url.clone() else {
            continue;
        };
        if let Some(uri) = local_data_uri(root, &url)? {
            outcome.background_data_uri = Some(uri);
            embedded += 1;
        }
    }

    debug!(embedded, root = %root.display(), "images embedded");
    Ok(embedded)
}
