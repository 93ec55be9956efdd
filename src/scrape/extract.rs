use scraper::{ElementRef, Html, Selector};

// Elements whose text is never visible on the page
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Extract the visible text of an HTML document, preferring `<main>`
/// and falling back to `<body>`. Text nodes are trimmed and joined
/// with newlines. Returns `None` when there is nothing readable.
pub fn extract_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let main = Selector::parse("main").ok()?;
    let body = Selector::parse("body").ok()?;

    // An empty `<main>` falls through to the body
    document
        .select(&main)
        .next()
        .into_iter()
        .chain(document.select(&body).next())
        .find_map(visible_text)
}

fn visible_text(root: ElementRef) -> Option<String> {
    let mut lines: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }

    if lines.is_empty() {
        return None;
    }
    Some(lines.join("\n"))
}
