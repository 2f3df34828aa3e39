//! Convenient extensions for the querying interface of [`scraper`]

#[doc(inline)]
pub use scraper;

use anyhow::anyhow;
use scraper::{selectable::Selectable, ElementRef, Html, Selector};
use std::fmt::Debug;

#[allow(clippy::module_name_repetitions)]
/// A simple wrapper trait that provides the `find` and `find_all` methods
/// to [`scraper`]'s [`Selectable`] elements, inspired by the interface of
/// Python's `BeautifulSoup`.
pub trait SoupFind<'a> {
    /// Finds all descendant elements matching the CSS selectors
    /// and collect them into a [`Vec`], in document order.
    fn find_all(self, selectors: &str) -> Vec<ElementRef<'a>>;

    /// Finds the first element that matches the CSS selectors,
    /// returning [`anyhow::Error`] if not found.
    fn find(self, selectors: &str) -> anyhow::Result<ElementRef<'a>>;
}

trait AsHtml {
    fn as_html(&self) -> String;
}

impl<'a, T: Selectable<'a> + Debug + AsHtml> SoupFind<'a> for T {
    fn find_all(self, selectors: &str) -> Vec<ElementRef<'a>> {
        let selector = Selector::parse(selectors).expect("the selector should be valid");
        self.select(&selector).collect()
    }

    fn find(self, selectors: &str) -> anyhow::Result<ElementRef<'a>> {
        let selector = Selector::parse(selectors).expect("the selector should be valid");
        let err = anyhow!("could not select '{selectors}' in '{}'", self.as_html());
        let element = self.select(&selector).next().ok_or(err)?;
        Ok(element)
    }
}

impl AsHtml for &Html {
    fn as_html(&self) -> String {
        self.html()
    }
}

impl AsHtml for ElementRef<'_> {
    fn as_html(&self) -> String {
        self.html()
    }
}

/// A trivial wrapper trait for [`scraper`]'s [`.attr()`][ElementRef::attr]
/// that returns an [`anyhow::Result`] instead of an [`Option`].
pub trait TryAttr<'a> {
    /// Calls [`.attr`][ElementRef::attr] and errors out if there is [`None`].
    fn try_attr(&self, attr: &str) -> anyhow::Result<&'a str>;
}

impl<'a> TryAttr<'a> for ElementRef<'a> {
    fn try_attr(&self, attr: &str) -> anyhow::Result<&'a str> {
        let err = anyhow!("could not find attribute '{attr}' in '{}'", self.html());
        self.attr(attr).ok_or(err)
    }
}

/// Text and tree helpers for table-shaped markup.
pub trait SoupText<'a> {
    /// All text below the element with every whitespace run (newlines and
    /// tabs included) collapsed into a single space, trimmed.
    fn normalized_text(&self) -> String;

    /// Direct child elements whose tag name is one of `names`, skipping
    /// text nodes and comments.
    fn children_named(&self, names: &[&str]) -> Vec<ElementRef<'a>>;

    /// Whether the `class` attribute lists `class` as one of its tokens.
    fn has_class_token(&self, class: &str) -> bool;
}

impl<'a> SoupText<'a> for ElementRef<'a> {
    fn normalized_text(&self) -> String {
        let text: String = self.text().collect();
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn children_named(&self, names: &[&str]) -> Vec<ElementRef<'a>> {
        self.children()
            .filter_map(ElementRef::wrap)
            .filter(|child| names.contains(&child.value().name()))
            .collect()
    }

    fn has_class_token(&self, class: &str) -> bool {
        self.value().classes().any(|token| token == class)
    }
}

#[test]
fn normalize_cell_text() {
    let html = Html::parse_fragment("<div>\n\t✔ <b>pass</b>\n   ok\t</div>");
    let div = html.root_element().find("div").unwrap();
    assert_eq!(div.normalized_text(), "✔ pass ok");
}

#[test]
fn direct_children_only() {
    let html = Html::parse_document(
        "<table><tr><th>a</th><td>b<table><tr><td>nested</td></tr></table></td></tr></table>",
    );
    let row = (&html).find("tr").unwrap();
    let cells = row.children_named(&["td", "th"]);
    assert_eq!(cells.len(), 2);
    assert!(!row.has_class_token("row"));
}
