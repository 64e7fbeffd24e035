use crate::geom::{Point, Rect};
use crate::sexp::List;

/// Bounding rectangle derived from graphic lines on `Edge.Cuts`
/// (spec.md §3 "BoardOutline").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardOutline {
    pub rect: Rect,
}

impl BoardOutline {
    pub fn from_root(root: &List) -> Self {
        let mut rect = Rect::empty();
        for line in root.find_all("gr_line") {
            if line.find("layer").and_then(|l| l.get_atom(0)).and_then(|a| a.as_str())
                != Some("Edge.Cuts")
            {
                continue;
            }
            let start = line.find("start").map(point_of).unwrap_or(Point::zero());
            let end = line.find("end").map(point_of).unwrap_or(Point::zero());
            rect = rect.united(&Rect::enclosing(start, end));
        }
        Self { rect }
    }

    pub fn min_x(&self) -> f64 {
        self.rect.l
    }

    pub fn max_x(&self) -> f64 {
        self.rect.r
    }

    pub fn min_y(&self) -> f64 {
        self.rect.b
    }

    pub fn max_y(&self) -> f64 {
        self.rect.t
    }
}

fn point_of(l: &List) -> Point {
    let f = l.floats();
    Point::new(*f.first().unwrap_or(&0.0), *f.get(1).unwrap_or(&0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexp::Document;

    #[test]
    fn derives_bounds_from_edge_cuts_only() {
        let doc = Document::parse(
            r#"(kicad_pcb
                 (gr_line (start 0 0) (end 50 0) (layer "Edge.Cuts"))
                 (gr_line (start 50 0) (end 50 50) (layer "Edge.Cuts"))
                 (gr_line (start 0 0) (end 0 0) (layer "F.SilkS")))"#,
            "kicad_pcb",
        )
        .unwrap();
        let outline = BoardOutline::from_root(doc.root());
        assert_eq!(outline.rect.w(), 50.0);
        assert_eq!(outline.rect.h(), 50.0);
    }
}
