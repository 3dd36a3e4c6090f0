// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Owned SVG markup tree — parsing and serialisation with `quick-xml`.
//
// Every node is exclusively owned by its parent and every element carries an
// ordered attribute list. Elements are addressed by `ElementPath`, the list of
// child indices leading from the root to the element.

use std::fmt;
use std::str::FromStr;

use bogenwerk_core::error::{BogenwerkError, Result};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::{debug, instrument};

/// A single `name="value"` pair on an element. Values are stored unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Child node of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Character data, unescaped.
    Text(String),
    CData(String),
    /// Raw comment body.
    Comment(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }
}

/// A markup element with its attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        match self.name.rsplit_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Set an attribute, replacing its value in place if it already exists.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute {
                name: name.to_owned(),
                value,
            }),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|attr| attr.name == name)?;
        Some(self.attributes.remove(index).value)
    }

    /// Name of the attribute holding this element's resource reference:
    /// `href` when present, otherwise the legacy `xlink:href`.
    pub fn href_attribute(&self) -> Option<&'static str> {
        if self.attr("href").is_some() {
            Some("href")
        } else if self.attr("xlink:href").is_some() {
            Some("xlink:href")
        } else {
            None
        }
    }

    pub fn href(&self) -> Option<&str> {
        self.href_attribute().and_then(|name| self.attr(name))
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Concatenated text and CDATA content of this element and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Resolve a child-index path relative to this element.
    pub fn descendant(&self, path: &[usize]) -> Option<&Element> {
        let mut current = self;
        for &index in path {
            current = current.children.get(index)?.as_element()?;
        }
        Some(current)
    }

    pub fn descendant_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &index in path {
            current = current.children.get_mut(index)?.as_element_mut()?;
        }
        Some(current)
    }

    /// Visit this element and every descendant element in document order.
    pub fn walk<F>(&self, visit: &mut F)
    where
        F: FnMut(&[usize], &Element),
    {
        let mut path = Vec::new();
        walk_inner(self, &mut path, visit);
    }

    /// Mutable counterpart of [`Element::walk`].
    pub fn walk_mut<F>(&mut self, visit: &mut F)
    where
        F: FnMut(&[usize], &mut Element),
    {
        let mut path = Vec::new();
        walk_inner_mut(self, &mut path, visit);
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(text) | Node::CData(text) => out.push_str(text),
            Node::Element(inner) => collect_text(inner, out),
            Node::Comment(_) => {}
        }
    }
}

fn walk_inner<F>(element: &Element, path: &mut Vec<usize>, visit: &mut F)
where
    F: FnMut(&[usize], &Element),
{
    visit(path, element);
    for (index, child) in element.children.iter().enumerate() {
        if let Node::Element(inner) = child {
            path.push(index);
            walk_inner(inner, path, visit);
            path.pop();
        }
    }
}

fn walk_inner_mut<F>(element: &mut Element, path: &mut Vec<usize>, visit: &mut F)
where
    F: FnMut(&[usize], &mut Element),
{
    visit(path, element);
    for (index, child) in element.children.iter_mut().enumerate() {
        if let Node::Element(inner) = child {
            path.push(index);
            walk_inner_mut(inner, path, visit);
            path.pop();
        }
    }
}

/// Address of an element: child indices from the root. The root itself is the
/// empty path. Displayed and parsed as `0/3/1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ElementPath(pub Vec<usize>);

impl ElementPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl From<&[usize]> for ElementPath {
    fn from(path: &[usize]) -> Self {
        Self(path.to_vec())
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        let parts: Vec<String> = self.0.iter().map(usize::to_string).collect();
        write!(f, "{}", parts.join("/"))
    }
}

impl FromStr for ElementPath {
    type Err = BogenwerkError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        trimmed
            .split('/')
            .map(|part| {
                part.parse::<usize>()
                    .map_err(|_| BogenwerkError::InvalidElementPath(s.to_owned()))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

/// Items preceding the root element.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PrologItem {
    Declaration,
    DocType(String),
    Comment(String),
}

/// A parsed SVG page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markup {
    prolog: Vec<PrologItem>,
    root: Element,
}

impl Markup {
    /// Wrap an already-built root element.
    pub fn from_root(root: Element) -> Self {
        Self {
            prolog: Vec::new(),
            root,
        }
    }

    /// Parse markup text. The root element must be `svg`.
    #[instrument(skip(text), fields(text_len = text.len()))]
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        reader.trim_text(false);

        let mut prolog = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event().map_err(|err| {
                BogenwerkError::Parse(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    err
                ))
            })?;

            match event {
                Event::Decl(_) => {
                    if root.is_none() && stack.is_empty() {
                        prolog.push(PrologItem::Declaration);
                    }
                }
                Event::DocType(doctype) => {
                    prolog.push(PrologItem::DocType(lossy(&doctype)));
                }
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        BogenwerkError::Parse("unexpected closing tag".into())
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|err| BogenwerkError::Parse(format!("bad text: {err}")))?
                        .into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Text(value)),
                        None if value.trim().is_empty() => {}
                        None => {
                            return Err(BogenwerkError::Parse(
                                "text outside the root element".into(),
                            ));
                        }
                    }
                }
                Event::CData(cdata) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::CData(lossy(&cdata)));
                    }
                }
                Event::Comment(comment) => match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Comment(lossy(&comment))),
                    None if root.is_none() => prolog.push(PrologItem::Comment(lossy(&comment))),
                    None => {}
                },
                Event::PI(_) => {}
                Event::Eof => break,
            }
        }

        if !stack.is_empty() {
            return Err(BogenwerkError::Parse(format!(
                "{} unclosed element(s)",
                stack.len()
            )));
        }
        let root = root.ok_or_else(|| BogenwerkError::Parse("no root element".into()))?;
        if root.local_name() != "svg" {
            return Err(BogenwerkError::Parse(format!(
                "root element is <{}>, expected <svg>",
                root.name
            )));
        }

        debug!(children = root.children.len(), "Markup parsed");
        Ok(Self { prolog, root })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn element(&self, path: &ElementPath) -> Option<&Element> {
        self.root.descendant(path.as_slice())
    }

    pub fn element_mut(&mut self, path: &ElementPath) -> Option<&mut Element> {
        self.root.descendant_mut(path.as_slice())
    }

    /// Serialise the tree back to markup text.
    pub fn to_markup_string(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());

        for item in &self.prolog {
            let event = match item {
                PrologItem::Declaration => {
                    Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None))
                }
                PrologItem::DocType(doctype) => {
                    Event::DocType(BytesText::from_escaped(doctype.as_str()))
                }
                PrologItem::Comment(comment) => {
                    Event::Comment(BytesText::from_escaped(comment.as_str()))
                }
            };
            writer.write_event(event).map_err(write_error)?;
            writer.get_mut().push(b'\n');
        }

        write_element(&mut writer, &self.root)?;

        String::from_utf8(writer.into_inner())
            .map_err(|err| BogenwerkError::Markup(format!("output is not UTF-8: {err}")))
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|err| BogenwerkError::Parse(format!("element name is not UTF-8: {err}")))?
        .to_owned();

    let mut element = Element::new(name);
    for attribute in start.attributes() {
        let attribute = attribute
            .map_err(|err| BogenwerkError::Parse(format!("bad attribute on <{}>: {err}", element.name)))?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|err| BogenwerkError::Parse(format!("attribute name is not UTF-8: {err}")))?
            .to_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| BogenwerkError::Parse(format!("bad value for {key}: {err}")))?
            .into_owned();
        element.attributes.push(Attribute { name: key, value });
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(BogenwerkError::Parse("more than one root element".into())),
    }
}

fn write_error(err: impl fmt::Display) -> BogenwerkError {
    BogenwerkError::Markup(err.to_string())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for attribute in &element.attributes {
        start.push_attribute((attribute.name.as_str(), attribute.value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(write_error)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;
    for child in &element.children {
        match child {
            Node::Element(inner) => write_element(writer, inner)?,
            Node::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(write_error)?,
            Node::CData(text) => writer
                .write_event(Event::CData(BytesCData::new(text.as_str())))
                .map_err(write_error)?,
            Node::Comment(comment) => writer
                .write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
                .map_err(write_error)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_error)?;
    Ok(())
}
