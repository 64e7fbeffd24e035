//! Lossless S-expression document engine (spec.md §4.1).
//!
//! Parses KiCad's `.kicad_pcb` / `.kicad_sch` / `.kicad_sym` nested
//! S-expression files into an owned tree, exposes typed read access, and
//! re-serializes with formatting that keeps unrelated version-control diffs
//! small.

mod lexer;
mod parser;
mod serializer;

pub use lexer::{Lexer, Token};
pub use parser::Parser;
pub use serializer::Serializer;

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// The parsed value of an atom: a string, integer, or float.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomValue {
    Str(String),
    Int(i64),
    Float(f64),
}

/// A leaf node. `original` retains the verbatim input text for numeric
/// atoms so round-trip serialization reproduces it exactly (spec.md
/// invariant #2), unless the atom has since been mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub value: AtomValue,
    pub original: Option<String>,
}

impl Atom {
    pub fn str(s: impl Into<String>) -> Self {
        Self { value: AtomValue::Str(s.into()), original: None }
    }

    pub fn int(v: i64) -> Self {
        Self { value: AtomValue::Int(v), original: None }
    }

    pub fn float(v: f64) -> Self {
        Self { value: AtomValue::Float(v), original: None }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            AtomValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.value {
            AtomValue::Int(v) => Some(v),
            AtomValue::Float(v) => Some(v as i64),
            AtomValue::Str(ref s) => s.parse().ok(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            AtomValue::Int(v) => Some(v as f64),
            AtomValue::Float(v) => Some(v),
            AtomValue::Str(ref s) => s.parse().ok(),
        }
    }
}

/// A list node: an optional leading name symbol plus ordered children.
/// Invariant: a node never has both a name and an atom value (enforced by
/// `SExp` being an enum rather than a struct with both fields).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct List {
    pub name: Option<String>,
    pub children: Vec<SExp>,
}

impl List {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), children: Vec::new() }
    }

    pub fn anonymous() -> Self {
        Self { name: None, children: Vec::new() }
    }

    /// First child list with the given tag name, at this level only.
    pub fn find(&self, name: &str) -> Option<&List> {
        self.children.iter().find_map(|c| match c {
            SExp::List(l) if l.name.as_deref() == Some(name) => Some(l),
            _ => None,
        })
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut List> {
        self.children.iter_mut().find_map(|c| match c {
            SExp::List(l) if l.name.as_deref() == Some(name) => Some(l),
            _ => None,
        })
    }

    /// All child lists with the given tag name, at this level only.
    pub fn find_all(&self, name: &str) -> Vec<&List> {
        self.children
            .iter()
            .filter_map(|c| match c {
                SExp::List(l) if l.name.as_deref() == Some(name) => Some(l),
                _ => None,
            })
            .collect()
    }

    /// Find the first descendant (depth-first, including self's children
    /// recursively) tagged `name` whose own child tagged `attr_name` is an
    /// atom string equal to `attr_value`. E.g. find a `footprint` with a
    /// `property` child whose first value is `"Reference"` and second is
    /// `"U1"`.
    pub fn find_with_attr(&self, name: &str, attr_name: &str, attr_value: &str) -> Option<&List> {
        fn matches(l: &List, attr_name: &str, attr_value: &str) -> bool {
            l.find(attr_name)
                .and_then(|a| a.children.get(1))
                .and_then(|v| match v {
                    SExp::Atom(a) => a.as_str(),
                    _ => None,
                })
                .map(|s| s == attr_value)
                .unwrap_or(false)
        }
        fn walk<'a>(node: &'a List, name: &str, attr_name: &str, attr_value: &str) -> Option<&'a List> {
            for c in &node.children {
                if let SExp::List(l) = c {
                    if l.name.as_deref() == Some(name) && matches(l, attr_name, attr_value) {
                        return Some(l);
                    }
                    if let Some(found) = walk(l, name, attr_name, attr_value) {
                        return Some(found);
                    }
                }
            }
            None
        }
        walk(self, name, attr_name, attr_value)
    }

    /// Get the atom at the given positional index among this node's
    /// children (not counting the name).
    pub fn get_atom(&self, index: usize) -> Option<&Atom> {
        match self.children.get(index) {
            Some(SExp::Atom(a)) => Some(a),
            _ => None,
        }
    }

    pub fn set_atom(&mut self, index: usize, atom: Atom) {
        while self.children.len() <= index {
            self.children.push(SExp::Atom(Atom::str("")));
        }
        self.children[index] = SExp::Atom(atom);
    }

    /// All leading atom children interpreted as floats, stopping at the
    /// first non-atom or non-numeric child.
    pub fn floats(&self) -> Vec<f64> {
        self.children
            .iter()
            .map_while(|c| match c {
                SExp::Atom(a) => a.as_f64(),
                _ => None,
            })
            .collect()
    }

    pub fn append(&mut self, child: SExp) {
        self.children.push(child);
    }

    pub fn insert(&mut self, index: usize, child: SExp) {
        self.children.insert(index.min(self.children.len()), child);
    }

    /// Remove the first child list with the given tag name. Returns it if found.
    pub fn remove_first(&mut self, name: &str) -> Option<SExp> {
        let pos = self.children.iter().position(|c| matches!(c, SExp::List(l) if l.name.as_deref() == Some(name)));
        pos.map(|i| self.children.remove(i))
    }
}

/// Either an atom or a list (spec.md §3 "SExp node").
#[derive(Debug, Clone, PartialEq)]
pub enum SExp {
    Atom(Atom),
    List(List),
}

impl SExp {
    pub fn as_list(&self) -> Option<&List> {
        match self {
            SExp::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut List> {
        match self {
            SExp::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            SExp::Atom(a) => Some(a),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            SExp::List(l) => l.name.as_deref(),
            SExp::Atom(_) => None,
        }
    }
}

/// Owns the root tree and the file it was parsed from. Mutations are
/// applied through `Document::edit`, which hands out a unique borrow of
/// the root so no view can outlive a concurrent mutation.
#[derive(Debug, Clone)]
pub struct Document {
    root: List,
    path: Option<PathBuf>,
}

impl Document {
    /// Parse `text` and check the root tag matches `expected_root`
    /// (e.g. `"kicad_pcb"`). A mismatch is a `SchemaError`, distinct from
    /// a parse error (spec.md §4.1 "Failure semantics").
    pub fn parse(text: &str, expected_root: &str) -> Result<Self> {
        let tokens = Lexer::new(text).lex()?;
        let root = Parser::new(tokens).parse()?;
        let root = match root {
            SExp::List(l) => l,
            SExp::Atom(_) => {
                return Err(Error::schema("document root must be a named list"));
            }
        };
        if root.name.as_deref() != Some(expected_root) {
            return Err(Error::schema(format!(
                "expected root tag '{}', got '{:?}'",
                expected_root, root.name
            )));
        }
        Ok(Self { root, path: None })
    }

    pub fn load(path: impl AsRef<Path>, expected_root: &str) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::schema(format!("reading {}: {e}", path.display())))?;
        let mut doc = Self::parse(&text, expected_root)?;
        doc.path = Some(path.to_path_buf());
        Ok(doc)
    }

    pub fn root(&self) -> &List {
        &self.root
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Apply a mutation under a unique borrow of the root.
    pub fn edit<F, T>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut List) -> T,
    {
        f(&mut self.root)
    }

    pub fn serialize(&self) -> String {
        Serializer::new().serialize(&self.root)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.serialize())
            .map_err(|e| Error::schema(format!("writing {}: {e}", path.as_ref().display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_and_find_all() {
        let doc = Document::parse(
            r#"(kicad_pcb (version 20231120) (footprint "R1") (footprint "R2"))"#,
            "kicad_pcb",
        )
        .unwrap();
        assert!(doc.root().find("version").is_some());
        assert_eq!(doc.root().find_all("footprint").len(), 2);
    }

    #[test]
    fn root_tag_mismatch_is_schema_error() {
        let err = Document::parse("(kicad_sch)", "kicad_pcb").unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn find_with_attr() {
        let doc = Document::parse(
            r#"(kicad_pcb
                 (footprint "R_0402" (property "Reference" "R1"))
                 (footprint "R_0402" (property "Reference" "U1")))"#,
            "kicad_pcb",
        )
        .unwrap();
        let found = doc.root().find_with_attr("footprint", "property", "U1");
        assert!(found.is_some());
        assert_eq!(found.unwrap().get_atom(0).and_then(Atom::as_str), Some("R_0402"));
        assert!(doc.root().find_with_attr("footprint", "property", "R9").is_none());
    }

    #[test]
    fn find_by_name_then_attr_commutes_with_find_all_then_filter() {
        let doc = Document::parse(
            r#"(kicad_pcb
                 (footprint "R_0402" (property "Reference" "R1"))
                 (footprint "R_0402" (property "Reference" "U1"))
                 (footprint "R_0402" (property "Reference" "U2")))"#,
            "kicad_pcb",
        )
        .unwrap();

        fn has_reference(f: &List, value: &str) -> bool {
            f.find("property").and_then(|p| p.children.get(1)).and_then(|v| v.as_atom()).and_then(|a| a.as_str())
                == Some(value)
        }

        // Path 1: find_all by name, then filter by attribute.
        let via_filter =
            doc.root().find_all("footprint").into_iter().find(|f| has_reference(f, "U1")).cloned();

        // Path 2: find directly via the attribute-aware walk, restricted to
        // footprints whose "property" child matches "Reference"/"U1".
        let via_find = doc.root().find_all("footprint").into_iter().find(|f| {
            f.find("property")
                .map(|p| p.get_atom(0).and_then(Atom::as_str) == Some("Reference") && has_reference(f, "U1"))
                .unwrap_or(false)
        });

        assert_eq!(via_filter.as_ref(), via_find);
        assert!(via_filter.is_some());
    }

    #[test]
    fn edit_and_append() {
        let mut doc = Document::parse("(kicad_pcb (version 1))", "kicad_pcb").unwrap();
        doc.edit(|root| {
            root.append(SExp::List(List::new("net")));
        });
        assert_eq!(doc.root().find_all("net").len(), 1);
    }
}
