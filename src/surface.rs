//! Host container seam.
//!
//! The viewer is mounted into a host-provided container and owns every
//! element it appends there (the render canvas and the stats overlay). Hosts
//! implement [`Container`] over their own UI toolkit; [`HeadlessContainer`]
//! keeps elements in memory for tools and tests.

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Canvas,
    StatsOverlay,
}

pub trait Container {
    /// Client size in pixels
    fn size(&self) -> (u32, u32);

    fn append_element(&mut self, kind: ElementKind) -> ElementId;

    /// Returns `false` when the element is not (or no longer) a child
    fn remove_element(&mut self, id: ElementId) -> bool;

    fn elements(&self) -> Vec<(ElementId, ElementKind)>;

    /// Replaces an element's text content; ignored by containers without text
    fn set_text(&mut self, _id: ElementId, _text: &str) {}

    fn count(&self, kind: ElementKind) -> usize {
        self.elements().iter().filter(|(_, k)| *k == kind).count()
    }

    fn contains(&self, id: ElementId) -> bool {
        self.elements().iter().any(|(e, _)| *e == id)
    }
}

#[derive(Debug, Clone)]
struct Element {
    id: ElementId,
    kind: ElementKind,
    text: String,
}

/// In-memory container
#[derive(Debug, Clone)]
pub struct HeadlessContainer {
    width: u32,
    height: u32,
    next_id: u64,
    elements: Vec<Element>,
}

impl HeadlessContainer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            next_id: 1,
            elements: Vec::new(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn text(&self, id: ElementId) -> Option<&str> {
        self.elements.iter().find(|e| e.id == id).map(|e| e.text.as_str())
    }
}

impl Default for HeadlessContainer {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl Container for HeadlessContainer {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn append_element(&mut self, kind: ElementKind) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.elements.push(Element {
            id,
            kind,
            text: String::new(),
        });
        debug!("Appended {:?} element {:?}", kind, id);
        id
    }

    fn remove_element(&mut self, id: ElementId) -> bool {
        let before = self.elements.len();
        self.elements.retain(|e| e.id != id);
        before != self.elements.len()
    }

    fn elements(&self) -> Vec<(ElementId, ElementKind)> {
        self.elements.iter().map(|e| (e.id, e.kind)).collect()
    }

    fn set_text(&mut self, id: ElementId, text: &str) {
        if let Some(element) = self.elements.iter_mut().find(|e| e.id == id) {
            element.text = text.to_string();
        }
    }
}
