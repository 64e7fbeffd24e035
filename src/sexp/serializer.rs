//! Two-mode renderer matching KiCad's own formatting conventions closely
//! enough that programmatic edits produce small diffs (spec.md §4.1).

use super::{Atom, AtomValue, List, SExp};

const INDENT: &str = "  ";
const INLINE_WIDTH_LIMIT: usize = 80;

/// Names that are always rendered on a single line regardless of width:
/// position tuples and other compact leaf-ish constructs.
const FORCE_INLINE: &[&str] = &[
    "at", "xy", "start", "end", "mid", "pts", "center", "stroke", "font", "effects", "uuid",
    "size", "offset", "color", "justify", "fill", "drill", "layers", "scale", "thickness",
];

/// Names that always get the structural multi-line treatment, even if
/// every child happens to be a bare atom.
const FORCE_MULTILINE: &[&str] = &[
    "kicad_pcb",
    "kicad_sch",
    "kicad_symbol_lib",
    "lib_symbols",
    "symbol",
    "footprint",
    "property",
    "wire",
    "segment",
    "via",
    "pad",
    "zone",
    "net",
    "net_class",
    "setup",
    "layers",
    "general",
];

/// Known unquoted keywords (spec.md §4.1 quoting rules), grounded on the
/// KiCad-format keyword sets actually observed across pad/layer/stroke/
/// pin-type/justify vocabularies.
const UNQUOTED_KEYWORDS: &[&str] = &[
    "yes", "no", "true", "false",
    "hide", "show",
    "none", "outline", "background", "solid",
    "default", "dash", "dash_dot", "dash_dot_dot", "dot",
    "left", "right", "center", "top", "bottom", "mirror",
    "input", "output", "bidirectional", "tri_state", "passive",
    "free", "unspecified", "power_in", "power_out",
    "open_collector", "open_emitter", "no_connect", "line",
    "inverted", "clock", "inverted_clock", "input_low",
    "clock_low", "output_low", "edge_clock_high", "non_logic",
    "signal", "power", "user", "mixed", "jumper",
    "thru_hole", "smd", "connect", "np_thru_hole",
    "rect", "oval", "circle", "roundrect", "trapezoid", "custom",
    "reference", "value",
    "thermal_reliefs", "full", "hatch", "hatched",
    "blind", "micro", "through",
    "arc",
    "italic", "bold",
    "through_hole", "virtual", "exclude_from_pos_files",
    "exclude_from_bom", "board_only", "dnp",
];

pub struct Serializer {
    indent: String,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer {
    pub fn new() -> Self {
        Self { indent: INDENT.to_string() }
    }

    pub fn serialize(&self, root: &List) -> String {
        let mut lines = Vec::new();
        self.serialize_node(root, 0, &mut lines);
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    fn serialize_node(&self, node: &List, depth: usize, lines: &mut Vec<String>) {
        let prefix = self.indent.repeat(depth);
        let tag = node.name.as_deref();

        let forced_inline = tag.map(|t| FORCE_INLINE.contains(&t)).unwrap_or(false);
        let forced_multiline = tag.map(|t| FORCE_MULTILINE.contains(&t)).unwrap_or(false);
        let has_nested = node.children.iter().any(|c| matches!(c, SExp::List(_)));

        let inline = if forced_inline {
            true
        } else if forced_multiline {
            false
        } else if has_nested {
            false
        } else {
            let rendered = self.render_inline(node);
            rendered.len() < INLINE_WIDTH_LIMIT
        };

        if inline {
            lines.push(format!("{prefix}{}", self.render_inline(node)));
            return;
        }

        let mut simple = Vec::new();
        let mut complex = Vec::new();
        for c in &node.children {
            match c {
                SExp::Atom(a) => simple.push(format_atom(a)),
                SExp::List(l) => complex.push(l),
            }
        }

        let mut opening = format!("{prefix}({}", tag.unwrap_or(""));
        if !simple.is_empty() {
            opening.push(' ');
            opening.push_str(&simple.join(" "));
        }

        if complex.is_empty() {
            opening.push(')');
            lines.push(opening);
        } else {
            lines.push(opening);
            for child in complex {
                self.serialize_node(child, depth + 1, lines);
            }
            lines.push(format!("{prefix})"));
        }
    }

    fn render_inline(&self, node: &List) -> String {
        let mut parts = Vec::with_capacity(node.children.len() + 1);
        parts.push(node.name.clone().unwrap_or_default());
        for c in &node.children {
            match c {
                SExp::Atom(a) => parts.push(format_atom(a)),
                SExp::List(l) => parts.push(self.render_inline(l)),
            }
        }
        format!("({})", parts.join(" ").trim_start())
    }
}

fn format_atom(atom: &Atom) -> String {
    match &atom.value {
        AtomValue::Str(s) => {
            if needs_quoting(s) {
                quote_string(s)
            } else {
                s.clone()
            }
        }
        AtomValue::Int(i) => atom.original.clone().unwrap_or_else(|| i.to_string()),
        AtomValue::Float(f) => atom.original.clone().unwrap_or_else(|| format_float(*f)),
    }
}

fn format_float(f: f64) -> String {
    if f == f.trunc() && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        // Rust's Display impl for f64 already produces the shortest string
        // that round-trips, which is the same goal %g serves here.
        format!("{f}")
    }
}

fn needs_quoting(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    if s.len() > 1 && (s.starts_with("0x") || s.starts_with("0X")) {
        return false;
    }
    let first = s.chars().next().unwrap();
    if first.is_ascii_digit() || first == '-' {
        return true;
    }
    if s.chars().any(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '(' | ')' | '"' | '\\')) {
        return true;
    }
    if UNQUOTED_KEYWORDS.contains(&s) {
        return false;
    }
    if s.contains('.') {
        return true;
    }
    false
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexp::{Document, Lexer, Parser};

    fn roundtrip(s: &str) -> String {
        let toks = Lexer::new(s).lex().unwrap();
        let root = Parser::new(toks).parse().unwrap();
        Serializer::new().serialize(root.as_list().unwrap())
    }

    #[test]
    fn version_preserved_verbatim() {
        let out = roundtrip(r#"(kicad_sch (version 20231120) (generator "eeschema"))"#);
        assert!(out.contains("(version 20231120)"));
    }

    #[test]
    fn at_is_inline() {
        let out = roundtrip(r#"(footprint "R" (at 1.5 2.5 90))"#);
        assert!(out.contains("(at 1.5 2.5 90)"));
    }

    #[test]
    fn layer_dotted_name_quoted() {
        let out = roundtrip(r#"(layer F.Cu)"#);
        assert!(out.contains("\"F.Cu\""));
    }

    #[test]
    fn keyword_left_unquoted() {
        let out = roundtrip(r#"(pad "1" thru_hole circle)"#);
        assert!(out.contains("thru_hole"));
        assert!(!out.contains("\"thru_hole\""));
    }

    #[test]
    fn idempotent_after_one_pass() {
        let text = r#"(kicad_pcb (version 20231120) (generator "pcbnew") (footprint "R_0402" (at 10 20) (pad "1" smd rect (at 0 0) (size 1 1))))"#;
        let first = roundtrip(text);
        let second = roundtrip(&first);
        assert_eq!(first, second);
    }

    #[test]
    fn parse_serialize_roundtrip_document() {
        let doc = Document::parse("(kicad_pcb (version 1))", "kicad_pcb").unwrap();
        let out = doc.serialize();
        let doc2 = Document::parse(&out, "kicad_pcb").unwrap();
        assert_eq!(doc.root(), doc2.root());
    }
}
