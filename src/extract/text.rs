use scraper::{ElementRef, Html, Node};

/// Elements whose text is never shown to a reader
const HIDDEN_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "template"];

/// Collapses runs of whitespace (spaces, tabs, newlines) to single spaces
/// and trims
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of one element, one space between its text nodes
///
/// `<address>Acme Corp<br>PO Box 7</address>` reads as `Acme Corp PO Box 7`.
pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Readable text of a document, one space between text nodes
pub fn visible_text(document: &Html) -> String {
    let mut pieces = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| HIDDEN_ELEMENTS.contains(&element.name()))
        });
        if !hidden && !text.trim().is_empty() {
            pieces.push(&**text);
        }
    }

    clean_text(&pieces.join(" "))
}
