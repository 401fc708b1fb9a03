//! Cleanup for over-escaped function call arguments. Some models emit
//! string values with one extra level of JSON escaping, so `\n` arrives
//! as a literal backslash-n and file paths arrive wrapped in quotes.

use serde_json::Value;

fn unescape_pass(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => output.push('\n'),
            Some('t') => output.push('\t'),
            Some('r') => output.push('\r'),
            Some('"') => output.push('"'),
            Some('\'') => output.push('\''),
            Some('\\') => output.push('\\'),
            // unknown escapes stay as written
            Some(other) => {
                output.push('\\');
                output.push(other);
            }
            None => output.push('\\'),
        }
    }
    output
}

fn needs_pass(input: &str) -> bool {
    input.contains('\\')
        && !input.contains('\n')
        && !input.contains('\t')
        && !input.contains('\r')
}

/// Undo one stray level of escaping in a string value.
///
/// A string that already carries raw control characters was decoded
/// properly; running a pass over it would corrupt literal backslashes,
/// so it is returned untouched. A resolution that would itself decode
/// further (doubled backslashes hiding an escape, as in `C:\\temp\\new`)
/// is discarded and the input kept as written. Every output is a fixed
/// point of this function.
pub fn unescape(input: &str) -> String {
    if !needs_pass(input) {
        return input.to_string();
    }
    let resolved = unescape_pass(input);
    if needs_pass(&resolved) && unescape_pass(&resolved) != resolved {
        return input.to_string();
    }
    resolved
}

fn strip_redundant_quotes(input: &str) -> &str {
    if input.len() >= 2 && input.starts_with('"') && input.ends_with('"') {
        &input[1..input.len() - 1]
    } else {
        input
    }
}

/// Fix over-escaped strings in a function call payload in place. Values
/// under path-valued keys also lose one redundant pair of wrapping
/// quotes, including each element of a path list.
pub fn unescape_arguments(arguments: &mut Value) {
    walk(arguments, false);
}

fn walk(value: &mut Value, path_context: bool) {
    match value {
        Value::String(text) => {
            let mut fixed = unescape(text);
            if path_context {
                fixed = strip_redundant_quotes(&fixed).to_string();
            }
            *text = fixed;
        }
        Value::Array(items) => {
            for item in items {
                walk(item, path_context);
            }
        }
        Value::Object(map) => {
            for (key, inner) in map.iter_mut() {
                let is_path = key == "filePath" || key == "contextPaths";
                walk(inner, is_path);
            }
        }
        _ => {}
    }
}
