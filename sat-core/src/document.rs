//! Hosting document: the element tree the viewer is embedded in.
//!
//! Elements are looked up by id. Buttons carry click handlers which receive
//! the display session explicitly when dispatched, so handlers never capture
//! the session themselves.

use crate::session::DisplaySession;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("no element with id {0:?}")]
    ElementNotFound(String),
    #[error("element {0:?} is not a {1}")]
    WrongElementKind(String, &'static str),
}

/// A click handler. Invoked once per click, any number of times.
pub type ClickHandler = Box<dyn FnMut(&mut DisplaySession)>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementKind {
    /// A surface a viewer can be mounted into.
    Container,
    /// A clickable control with a visible label.
    Button { label: String },
}

struct Element {
    kind: ElementKind,
    handlers: Vec<ClickHandler>,
}

#[derive(Default)]
pub struct Document {
    elements: HashMap<String, Element>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) an element with the given id.
    pub fn insert(&mut self, id: &str, kind: ElementKind) {
        self.elements.insert(
            id.to_string(),
            Element {
                kind,
                handlers: Vec::new(),
            },
        );
    }

    pub fn with_container(mut self, id: &str) -> Self {
        self.insert(id, ElementKind::Container);
        self
    }

    pub fn with_button(mut self, id: &str, label: &str) -> Self {
        self.insert(
            id,
            ElementKind::Button {
                label: label.to_string(),
            },
        );
        self
    }

    pub fn get(&self, id: &str) -> Result<&ElementKind, BootstrapError> {
        self.elements
            .get(id)
            .map(|e| &e.kind)
            .ok_or_else(|| BootstrapError::ElementNotFound(id.to_string()))
    }

    /// Every button as `(id, label)`, sorted by id.
    pub fn buttons(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<(&str, &str)> = self
            .elements
            .iter()
            .filter_map(|(id, e)| match &e.kind {
                ElementKind::Button { label } => Some((id.as_str(), label.as_str())),
                ElementKind::Container => None,
            })
            .collect();
        out.sort();
        out
    }

    /// Registers `handler` to run on every click of button `id`.
    pub fn on_click(&mut self, id: &str, handler: ClickHandler) -> Result<(), BootstrapError> {
        let element = self
            .elements
            .get_mut(id)
            .ok_or_else(|| BootstrapError::ElementNotFound(id.to_string()))?;

        if !matches!(element.kind, ElementKind::Button { .. }) {
            return Err(BootstrapError::WrongElementKind(id.to_string(), "button"));
        }
        element.handlers.push(handler);
        Ok(())
    }

    /// Dispatches one click on `id` to every handler registered on it.
    ///
    /// ### Returns
    /// The number of handlers invoked.
    pub fn click(&mut self, id: &str, session: &mut DisplaySession) -> Result<usize, BootstrapError> {
        let element = self
            .elements
            .get_mut(id)
            .ok_or_else(|| BootstrapError::ElementNotFound(id.to_string()))?;

        for handler in element.handlers.iter_mut() {
            handler(session);
        }
        Ok(element.handlers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerOptions;
    use crate::overlay::MemoryLoader;
    use std::sync::Arc;

    fn session() -> DisplaySession {
        DisplaySession::new("c", ViewerOptions::default(), Arc::new(MemoryLoader::default()))
    }

    #[test]
    fn lookups_report_missing_ids() {
        let doc = Document::new().with_container("c");
        assert_eq!(doc.get("c"), Ok(&ElementKind::Container));
        assert_eq!(
            doc.get("nope"),
            Err(BootstrapError::ElementNotFound("nope".into()))
        );
    }

    #[test]
    fn click_runs_handlers_every_time() {
        let mut doc = Document::new().with_button("b", "Go");
        doc.on_click("b", Box::new(|s: &mut DisplaySession| s.camera_mut().fly_home(0.0)))
            .unwrap();

        let mut s = session();
        assert_eq!(doc.click("b", &mut s), Ok(1));
        assert_eq!(doc.click("b", &mut s), Ok(1));
        assert_eq!(s.camera().home_requests(), 2);
    }

    #[test]
    fn handlers_only_attach_to_buttons() {
        let mut doc = Document::new().with_container("c");
        let err = doc.on_click("c", Box::new(|_: &mut DisplaySession| {})).unwrap_err();
        assert_eq!(err, BootstrapError::WrongElementKind("c".into(), "button"));

        let err = doc.on_click("x", Box::new(|_: &mut DisplaySession| {})).unwrap_err();
        assert_eq!(err, BootstrapError::ElementNotFound("x".into()));
    }

    #[test]
    fn buttons_are_listed_with_labels() {
        let doc = Document::new()
            .with_container("c")
            .with_button("b2", "Second")
            .with_button("b1", "First");
        assert_eq!(doc.buttons(), vec![("b1", "First"), ("b2", "Second")]);
    }
}
