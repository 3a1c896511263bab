//! Pasted connection snippets.
//!
//! Hosted document databases hand out their client settings as a JS object
//! literal, one `key: "value",` pair per line. [`parse_pasted_config`] turns
//! such a snippet into a [`BackendConfig`] so it can be added without typing
//! every field by hand.

use crate::error::PasteError;
use crate::models::BackendConfig;

pub fn parse_pasted_config(text: &str) -> Result<BackendConfig, PasteError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PasteError::Empty);
    }

    let mut params = std::collections::BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line == "{" || line == "}" || line == "};" {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = clean(key);
        if key.is_empty() || key.contains(' ') {
            // e.g. `const firebaseConfig = {`
            continue;
        }
        params.insert(key, clean(value));
    }

    let project_id = params
        .get("projectId")
        .filter(|p| !p.is_empty())
        .cloned()
        .ok_or(PasteError::MissingProjectId)?;

    Ok(BackendConfig {
        display_name: display_name_for(&project_id),
        id: project_id,
        params,
    })
}

fn clean(part: &str) -> String {
    part.trim()
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | ','))
        .collect::<String>()
        .trim()
        .to_string()
}

/// `nihongo-master-3f325` → `Nihongo`
fn display_name_for(project_id: &str) -> String {
    let head = project_id.split('-').next().unwrap_or(project_id);
    let mut chars = head.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
