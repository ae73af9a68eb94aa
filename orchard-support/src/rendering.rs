//! Text rendering utilities for human-friendly diagnostics.
//!
//! Provides helpers to format binding keys, key lists, dependency
//! chains and "did you mean?" suggestions in error output.

/// Renders a dependency chain as a readable string.
///
/// # Examples
/// ```
/// use orchard_support::rendering::render_chain;
///
/// let chain = vec!["Engine", "Gearbox", "Engine"];
/// assert_eq!(render_chain(&chain), "Engine → Gearbox → Engine");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    join(chain, " → ")
}

/// Renders a list of type names separated by commas.
///
/// ```
/// use orchard_support::rendering::render_list;
///
/// assert_eq!(render_list(&["X", "Y"]), "X, Y");
/// ```
pub fn render_list(items: &[impl AsRef<str>]) -> String {
    join(items, ", ")
}

/// Renders a type tagged with an annotation type.
///
/// ```
/// use orchard_support::rendering::render_annotated;
///
/// assert_eq!(render_annotated("Primary", "u32"), "Annotated<Primary, u32>");
/// ```
pub fn render_annotated(annotation: &str, type_name: &str) -> String {
    format!("Annotated<{annotation}, {type_name}>")
}

fn join(items: &[impl AsRef<str>], separator: &str) -> String {
    let mut rendered = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            rendered.push_str(separator);
        }
        rendered.push_str(item.as_ref());
    }
    rendered
}

/// Strips module paths from every path segment of a type name.
///
/// ```
/// use orchard_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("app::engine::Engine"), "Engine");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn app::traits::Wheel>"),
///     "Arc<dyn Wheel>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut segment_start = 0;

    for (idx, ch) in full_name.char_indices() {
        if matches!(ch, '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&') {
            result.push_str(last_path_segment(&full_name[segment_start..idx]));
            result.push(ch);
            segment_start = idx + ch.len_utf8();
        }
    }
    result.push_str(last_path_segment(&full_name[segment_start..]));
    result
}

fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Picks the available names closest to `requested`, best first.
///
/// A candidate matches when one name contains the other (full or
/// shortened) or when the shortened names share a prefix of at least
/// three characters.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let requested_full = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(usize, &str)> = available
        .iter()
        .filter(|name| !name.eq_ignore_ascii_case(requested))
        .filter_map(|&name| {
            let full = name.to_lowercase();
            let short = shorten_type_name(name).to_lowercase();

            let score = if full.contains(&requested_full) || requested_full.contains(&full) {
                100
            } else if short.contains(&requested_short) || requested_short.contains(&short) {
                80
            } else {
                let prefix = short
                    .chars()
                    .zip(requested_short.chars())
                    .take_while(|(a, b)| a == b)
                    .count();
                if prefix < 3 {
                    return None;
                }
                prefix * 10
            };
            Some((score, name))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(_, name)| name.to_string())
        .collect()
}
