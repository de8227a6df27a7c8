//! Document Extractor
//!
//! Thin query layer over `scraper` for the handful of shapes the workflows
//! read: forms with hidden inputs, marker elements and their text.
//!
//! Documents are parsed and queried synchronously and never held across an
//! `.await`; callers extract owned values and drop the tree.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::ParseError;

/// Parsed HTML response body
pub struct Document {
    html: Html,
}

/// A `<form>` element within a document
#[derive(Clone, Copy)]
pub struct Form<'a> {
    element: ElementRef<'a>,
    step: &'static str,
}

/// Compile a schema selector, naming the step on failure
pub fn selector(step: &'static str, css: &'static str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|_| ParseError::Invalid {
        step,
        marker: "selector",
        value: css.to_string(),
    })
}

/// Turn an absent lookup into a named schema error
pub fn require<T>(value: Option<T>, step: &'static str, marker: &'static str) -> Result<T, ParseError> {
    value.ok_or(ParseError::Missing { step, marker })
}

/// First descendant of `element` matching `css`
pub fn first_within<'a>(
    element: ElementRef<'a>,
    step: &'static str,
    css: &'static str,
) -> Result<Option<ElementRef<'a>>, ParseError> {
    let sel = selector(step, css)?;
    Ok(element.select(&sel).next())
}

/// Concatenated, whitespace-trimmed text of an element
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

impl Document {
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }

    /// First element matching `css`
    pub fn first(&self, step: &'static str, css: &'static str) -> Result<Option<ElementRef<'_>>, ParseError> {
        let sel = selector(step, css)?;
        Ok(self.html.select(&sel).next())
    }

    /// All elements matching `css`, in document order
    pub fn all(&self, step: &'static str, css: &'static str) -> Result<Vec<ElementRef<'_>>, ParseError> {
        let sel = selector(step, css)?;
        Ok(self.html.select(&sel).collect())
    }

    /// Form whose `action` attribute equals `action`
    pub fn form_with_action(&self, step: &'static str, action: &str) -> Result<Option<Form<'_>>, ParseError> {
        let sel = selector(step, "form[action]")?;
        Ok(self
            .html
            .select(&sel)
            .find(|el| el.value().attr("action") == Some(action))
            .map(|element| Form { element, step }))
    }

    /// Form whose `action` attribute matches `pattern`
    pub fn form_matching(&self, step: &'static str, pattern: &Regex) -> Result<Option<Form<'_>>, ParseError> {
        let sel = selector(step, "form[action]")?;
        Ok(self
            .html
            .select(&sel)
            .find(|el| el.value().attr("action").is_some_and(|a| pattern.is_match(a)))
            .map(|element| Form { element, step }))
    }

    /// All text in the document
    pub fn text(&self) -> String {
        self.html.root_element().text().collect()
    }
}

impl<'a> Form<'a> {
    pub fn action(&self) -> Option<&'a str> {
        self.element.value().attr("action")
    }

    /// Value of the named `<input>`, if the input exists
    pub fn input_value(&self, name: &str) -> Option<String> {
        let sel = Selector::parse("input[name]").ok()?;
        self.element
            .select(&sel)
            .find(|el| el.value().attr("name") == Some(name))
            .map(|el| el.value().attr("value").unwrap_or_default().to_string())
    }

    /// Value of a named `<input>` the step cannot proceed without
    pub fn require_input(&self, name: &'static str) -> Result<String, ParseError> {
        require(self.input_value(name), self.step, name)
    }
}
