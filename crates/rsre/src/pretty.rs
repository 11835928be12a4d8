use rhai::{Array, Dynamic, ImmutableString, Map};

use crate::bindings::timers::TimerHandle;

/// Containers longer than this are split across lines
const MAX_INLINE_WIDTH: usize = 72;

/// Format a script value for display, using Rhai literal syntax.
///
/// Strings are quoted, arrays print as `[1, 2]` and object maps as
/// `#{a: 1}`. Containers that don't fit on one line are printed one entry
/// per line, indented by two spaces per level.
pub fn pretty_print(value: &Dynamic) -> String {
    render(value, 0)
}

fn render(value: &Dynamic, indent: usize) -> String {
    let value = value.flatten_clone();

    if value.is_unit() {
        return "()".to_string();
    }
    if let Some(s) = value.clone().try_cast::<ImmutableString>() {
        return format!("{:?}", s.as_str());
    }
    if let Some(items) = value.clone().try_cast::<Array>() {
        let entries = items
            .iter()
            .map(|item| render(item, indent + 2))
            .collect::<Vec<_>>();
        return layout("[", "]", entries, indent);
    }
    if let Some(map) = value.clone().try_cast::<Map>() {
        let entries = map
            .iter()
            .map(|(key, item)| format!("{}: {}", render_key(key), render(item, indent + 2)))
            .collect::<Vec<_>>();
        return layout("#{", "}", entries, indent);
    }
    if let Some(handle) = value.clone().try_cast::<TimerHandle>() {
        return handle.to_string();
    }

    value.to_string()
}

fn render_key(key: &str) -> String {
    let is_identifier = key
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_alphanumeric() || c == '_');
    if is_identifier {
        key.to_string()
    } else {
        format!("{:?}", key)
    }
}

fn layout(open: &str, close: &str, entries: Vec<String>, indent: usize) -> String {
    if entries.is_empty() {
        return format!("{open}{close}");
    }

    let inline_width: usize = entries.iter().map(|e| e.len() + 2).sum::<usize>() + indent;
    if inline_width <= MAX_INLINE_WIDTH && !entries.iter().any(|e| e.contains('\n')) {
        return format!("{open}{}{close}", entries.join(", "));
    }

    let pad = " ".repeat(indent + 2);
    let mut out = String::from(open);
    out.push('\n');
    for entry in entries {
        out.push_str(&pad);
        out.push_str(&entry);
        out.push_str(",\n");
    }
    out.push_str(&" ".repeat(indent));
    out.push_str(close);
    out
}
