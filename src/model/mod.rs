//! Typed read-only views over a [`crate::sexp::Document`], plus write-back
//! helpers (spec.md §4.5 "DesignModel"). Grounded on `model::pcb::Pcb`,
//! rebuilt to wrap a generic `sexp` tree instead of a DSN-specific
//! document.

mod net;
mod outline;
mod rules;

pub use net::{Net, NetId, NetTable};
pub use outline::BoardOutline;
pub use rules::{DesignRules, RuleOverrides};

use crate::error::Result;
use crate::geom::{transform_pad, Point, Rect, TransformedPad};
use crate::sexp::{Atom, Document, List, SExp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    FrontCopper,
    BackCopper,
    EdgeCuts,
    Other,
}

impl Layer {
    pub fn from_name(name: &str) -> Self {
        match name {
            "F.Cu" => Layer::FrontCopper,
            "B.Cu" => Layer::BackCopper,
            "Edge.Cuts" => Layer::EdgeCuts,
            _ => Layer::Other,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Layer::FrontCopper => "F.Cu",
            Layer::BackCopper => "B.Cu",
            Layer::EdgeCuts => "Edge.Cuts",
            Layer::Other => "?",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pad {
    pub name: String,
    pub local: Point,
    pub size_x: f64,
    pub size_y: f64,
    pub drill: f64,
    pub layer: Layer,
    pub net: NetId,
}

impl Pad {
    pub fn is_through_hole(&self) -> bool {
        self.drill > 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub reference: String,
    pub footprint: String,
    pub pos: Point,
    /// Rotation index 0..=3, matching the placement vector's discrete field.
    pub rot_idx: i64,
    /// 0 = front, 1 = back.
    pub side: u8,
    pub width: f64,
    pub height: f64,
    pub pads: Vec<Pad>,
}

impl Component {
    pub fn rotation_deg(&self) -> f64 {
        [0.0, 90.0, 180.0, 270.0][self.rot_idx.rem_euclid(4) as usize]
    }

    /// AABB at the component's current placement, swapping width/height at
    /// 90/270 degrees (spec.md §4.2 "AABB for placed component").
    pub fn bounds(&self) -> Rect {
        let (w, h) = if self.rot_idx.rem_euclid(4) % 2 == 1 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        };
        Rect::centered(self.pos, w, h)
    }

    pub fn transformed_pads(&self) -> Vec<TransformedPad> {
        self.pads
            .iter()
            .map(|p| {
                transform_pad(
                    crate::geom::PadShape { local: p.local, size_x: p.size_x, size_y: p.size_y },
                    self.pos,
                    self.rot_idx,
                    self.side,
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trace {
    pub start: Point,
    pub end: Point,
    pub width: f64,
    pub layer: Layer,
    pub net: NetId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Via {
    pub pos: Point,
    pub diameter: f64,
    pub drill: f64,
    pub from_layer: Layer,
    pub to_layer: Layer,
    pub net: NetId,
}

/// A filled-zone copper pour. The polygon outline is the primary geometry;
/// `bounds` is a cached AABB derived from it, used by callers that only need
/// a quick reject test (spec.md §3 "Zone").
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub net: NetId,
    pub layer: Layer,
    pub polygon: Vec<Point>,
    pub bounds: Rect,
}

impl Zone {
    pub fn new(net: NetId, layer: Layer, polygon: Vec<Point>) -> Self {
        let bounds = bounds_of_polygon(&polygon);
        Self { net, layer, polygon, bounds }
    }
}

fn bounds_of_polygon(polygon: &[Point]) -> Rect {
    polygon.iter().fold(Rect::empty(), |acc, &p| acc.united(&Rect::enclosing(p, p)))
}

/// A no-routing area (spec.md §3 "Keepout"), grounded on `Keepout`/
/// `KeepoutType`. KiCad expresses these as `zone` lists
/// carrying a `keepout` child instead of a `net`/pour, so they're split out
/// of `parse_zones` rather than modeled as a `Zone` with net 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Keepout {
    pub layer: Layer,
    pub polygon: Vec<Point>,
    pub bounds: Rect,
}

impl Keepout {
    pub fn new(layer: Layer, polygon: Vec<Point>) -> Self {
        let bounds = bounds_of_polygon(&polygon);
        Self { layer, polygon, bounds }
    }
}

/// A snapshot view over a loaded PCB document (spec.md §4.5).
pub struct DesignModel<'a> {
    doc: &'a Document,
    pub components: Vec<Component>,
    pub nets: NetTable,
    pub traces: Vec<Trace>,
    pub vias: Vec<Via>,
    pub zones: Vec<Zone>,
    pub keepouts: Vec<Keepout>,
    pub outline: BoardOutline,
    pub rules: DesignRules,
}

impl<'a> DesignModel<'a> {
    pub fn from_document(doc: &'a Document) -> Result<Self> {
        let root = doc.root();
        let mut nets = NetTable::parse(root);
        let components = parse_components(root, &nets);
        nets.populate_pad_refs(&components);
        let traces = parse_traces(root, &nets);
        let vias = parse_vias(root, &nets);
        let (zones, keepouts) = parse_zones(root, &nets);
        let outline = BoardOutline::from_root(root);
        let rules = DesignRules::from_root(root);
        Ok(Self { doc, components, nets, traces, vias, zones, keepouts, outline, rules })
    }

    pub fn document(&self) -> &Document {
        self.doc
    }
}

fn atom_str(list: &List, tag: &str) -> Option<String> {
    list.find(tag).and_then(|l| l.get_atom(0)).and_then(|a| a.as_str()).map(str::to_string)
}

fn parse_components(root: &List, nets: &NetTable) -> Vec<Component> {
    root.find_all("footprint")
        .into_iter()
        .map(|fp| parse_component(fp, nets))
        .collect()
}

fn parse_component(fp: &List, nets: &NetTable) -> Component {
    let footprint = fp.get_atom(0).and_then(|a| a.as_str()).unwrap_or("").to_string();
    let reference = find_fp_text_reference(fp).unwrap_or_else(|| "?".to_string());

    let (pos, rot_idx) = fp
        .find("at")
        .map(|at| {
            let f = at.floats();
            let x = *f.first().unwrap_or(&0.0);
            let y = *f.get(1).unwrap_or(&0.0);
            let deg = *f.get(2).unwrap_or(&0.0);
            let idx = (deg / 90.0).round() as i64;
            (Point::new(x, y), idx)
        })
        .unwrap_or((Point::zero(), 0));

    let side = if atom_str(fp, "layer").as_deref() == Some("B.Cu") { 1u8 } else { 0u8 };

    let pads: Vec<Pad> = fp.find_all("pad").into_iter().map(|p| parse_pad(p, nets)).collect();

    let (width, height) = component_extent(&pads);

    Component { reference, footprint, pos, rot_idx, side, width, height, pads }
}

fn find_fp_text_reference(fp: &List) -> Option<String> {
    fp.find_all("fp_text").into_iter().find_map(|t| {
        if t.get_atom(0).and_then(|a| a.as_str()) == Some("reference") {
            t.get_atom(1).and_then(|a| a.as_str()).map(str::to_string)
        } else {
            None
        }
    }).or_else(|| {
        fp.find_all("property").into_iter().find_map(|p| {
            if p.get_atom(0).and_then(|a| a.as_str()) == Some("Reference") {
                p.get_atom(1).and_then(|a| a.as_str()).map(str::to_string)
            } else {
                None
            }
        })
    })
}

fn parse_pad(p: &List, nets: &NetTable) -> Pad {
    let name = p.get_atom(0).and_then(|a| a.as_str()).unwrap_or("").to_string();
    let (local, _) = p
        .find("at")
        .map(|at| {
            let f = at.floats();
            (Point::new(*f.first().unwrap_or(&0.0), *f.get(1).unwrap_or(&0.0)), ())
        })
        .unwrap_or((Point::zero(), ()));
    let (size_x, size_y) = p
        .find("size")
        .map(|s| {
            let f = s.floats();
            (*f.first().unwrap_or(&0.0), *f.get(1).unwrap_or(&0.0))
        })
        .unwrap_or((0.0, 0.0));
    let drill = p.find("drill").map(|d| d.floats().first().copied().unwrap_or(0.0)).unwrap_or(0.0);
    let layer = p
        .find("layers")
        .and_then(|l| l.get_atom(0))
        .and_then(|a| a.as_str())
        .map(Layer::from_name)
        .unwrap_or(Layer::Other);
    let net = p
        .find("net")
        .and_then(|n| n.get_atom(0))
        .and_then(|a| a.as_i64())
        .map(|v| v as NetId)
        .unwrap_or(0);
    let _ = nets;
    Pad { name, local, size_x, size_y, drill, layer, net }
}

fn component_extent(pads: &[Pad]) -> (f64, f64) {
    if pads.is_empty() {
        return (1.0, 1.0);
    }
    let mut r = Rect::empty();
    for p in pads {
        let b = Rect::centered(p.local, p.size_x, p.size_y);
        r = r.united(&b);
    }
    (r.w().max(0.1), r.h().max(0.1))
}

fn parse_traces(root: &List, nets: &NetTable) -> Vec<Trace> {
    let _ = nets;
    root.find_all("segment")
        .into_iter()
        .map(|s| {
            let start = s.find("start").map(point_of).unwrap_or(Point::zero());
            let end = s.find("end").map(point_of).unwrap_or(Point::zero());
            let width = s.find("width").and_then(|w| w.floats().first().copied()).unwrap_or(0.0);
            let layer = s
                .find("layer")
                .and_then(|l| l.get_atom(0))
                .and_then(|a| a.as_str())
                .map(Layer::from_name)
                .unwrap_or(Layer::Other);
            let net =
                s.find("net").and_then(|n| n.get_atom(0)).and_then(|a| a.as_i64()).unwrap_or(0) as NetId;
            Trace { start, end, width, layer, net }
        })
        .collect()
}

fn parse_vias(root: &List, nets: &NetTable) -> Vec<Via> {
    let _ = nets;
    root.find_all("via")
        .into_iter()
        .map(|v| {
            let pos = v.find("at").map(point_of).unwrap_or(Point::zero());
            let diameter = v.find("size").and_then(|s| s.floats().first().copied()).unwrap_or(0.0);
            let drill = v.find("drill").and_then(|d| d.floats().first().copied()).unwrap_or(0.0);
            let layers = v.find("layers");
            let from_layer = layers
                .and_then(|l| l.get_atom(0))
                .and_then(|a| a.as_str())
                .map(Layer::from_name)
                .unwrap_or(Layer::FrontCopper);
            let to_layer = layers
                .and_then(|l| l.get_atom(1))
                .and_then(|a| a.as_str())
                .map(Layer::from_name)
                .unwrap_or(Layer::BackCopper);
            let net =
                v.find("net").and_then(|n| n.get_atom(0)).and_then(|a| a.as_i64()).unwrap_or(0) as NetId;
            Via { pos, diameter, drill, from_layer, to_layer, net }
        })
        .collect()
}

fn zone_polygon(z: &List) -> Vec<Point> {
    z.find("polygon")
        .and_then(|poly| poly.find("pts"))
        .map(|pts| pts.find_all("xy").into_iter().map(point_of).collect())
        .unwrap_or_default()
}

fn zone_layer(z: &List) -> Layer {
    z.find("layer")
        .and_then(|l| l.get_atom(0))
        .and_then(|a| a.as_str())
        .map(Layer::from_name)
        .unwrap_or(Layer::Other)
}

/// Split a document's `zone` lists into copper pours and keepout areas
/// (distinguished by the presence of a `keepout` child, spec.md §3 "Zone"
/// / "Keepout").
fn parse_zones(root: &List, nets: &NetTable) -> (Vec<Zone>, Vec<Keepout>) {
    let _ = nets;
    let mut zones = Vec::new();
    let mut keepouts = Vec::new();
    for z in root.find_all("zone") {
        let layer = zone_layer(z);
        let polygon = zone_polygon(z);
        if z.find("keepout").is_some() {
            keepouts.push(Keepout::new(layer, polygon));
        } else {
            let net =
                z.find("net").and_then(|n| n.get_atom(0)).and_then(|a| a.as_i64()).unwrap_or(0) as NetId;
            zones.push(Zone::new(net, layer, polygon));
        }
    }
    (zones, keepouts)
}

fn point_of(l: &List) -> Point {
    let f = l.floats();
    Point::new(*f.first().unwrap_or(&0.0), *f.get(1).unwrap_or(&0.0))
}

/// Append a new trace segment as a top-level child of the root
/// (spec.md §4.5 write-back helpers).
pub fn add_segment(doc: &mut Document, trace: &Trace) {
    doc.edit(|root| {
        let mut seg = List::new("segment");
        seg.append(SExp::List(point_list("start", trace.start)));
        seg.append(SExp::List(point_list("end", trace.end)));
        seg.append(SExp::List(single("width", Atom::float(trace.width))));
        seg.append(SExp::List(single("layer", Atom::str(trace.layer.name()))));
        seg.append(SExp::List(single("net", Atom::int(trace.net as i64))));
        root.append(SExp::List(seg));
    });
}

pub fn add_via(doc: &mut Document, via: &Via) {
    doc.edit(|root| {
        let mut v = List::new("via");
        v.append(SExp::List(point_list("at", via.pos)));
        v.append(SExp::List(single("size", Atom::float(via.diameter))));
        v.append(SExp::List(single("drill", Atom::float(via.drill))));
        let mut layers = List::new("layers");
        layers.append(SExp::Atom(Atom::str(via.from_layer.name())));
        layers.append(SExp::Atom(Atom::str(via.to_layer.name())));
        v.append(SExp::List(layers));
        v.append(SExp::List(single("net", Atom::int(via.net as i64))));
        root.append(SExp::List(v));
    });
}

/// Remove every segment/via belonging to `net` (spec.md §4.5).
pub fn remove_net_routing(doc: &mut Document, net: NetId) {
    doc.edit(|root| {
        root.children.retain(|c| {
            let keep = match c {
                SExp::List(l) if l.name.as_deref() == Some("segment") || l.name.as_deref() == Some("via") => {
                    l.find("net").and_then(|n| n.get_atom(0)).and_then(|a| a.as_i64())
                        != Some(net as i64)
                }
                _ => true,
            };
            keep
        });
    });
}

/// Remove segments within `radius` of `p`, optionally filtered by net/layer.
pub fn remove_segments_near(
    doc: &mut Document,
    p: Point,
    radius: f64,
    net: Option<NetId>,
    layer: Option<Layer>,
) {
    doc.edit(|root| {
        root.children.retain(|c| {
            let Some(l) = c.as_list() else { return true };
            if l.name.as_deref() != Some("segment") {
                return true;
            }
            let start = l.find("start").map(point_of).unwrap_or(Point::zero());
            let end = l.find("end").map(point_of).unwrap_or(Point::zero());
            let near = start.dist(p) <= radius || end.dist(p) <= radius;
            if !near {
                return true;
            }
            if let Some(n) = net {
                let seg_net =
                    l.find("net").and_then(|x| x.get_atom(0)).and_then(|a| a.as_i64()).unwrap_or(0);
                if seg_net != n as i64 {
                    return true;
                }
            }
            if let Some(ly) = layer {
                let seg_layer = l
                    .find("layer")
                    .and_then(|x| x.get_atom(0))
                    .and_then(|a| a.as_str())
                    .map(Layer::from_name);
                if seg_layer != Some(ly) {
                    return true;
                }
            }
            false
        });
    });
}

fn point_list(tag: &str, p: Point) -> List {
    let mut l = List::new(tag);
    l.append(SExp::Atom(Atom::float(p.x)));
    l.append(SExp::Atom(Atom::float(p.y)));
    l
}

fn single(tag: &str, atom: Atom) -> List {
    let mut l = List::new(tag);
    l.append(SExp::Atom(atom));
    l
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> Document {
        Document::parse(
            r#"(kicad_pcb
                 (net 0 "")
                 (net 1 "GND")
                 (footprint "R_0402" (layer "F.Cu") (at 10 20 0)
                   (pad "1" smd rect (at -0.5 0) (size 0.6 0.6) (layers "F.Cu") (net 1)))
                 (gr_line (start 0 0) (end 100 0) (layer "Edge.Cuts"))
                 (gr_line (start 100 0) (end 100 100) (layer "Edge.Cuts"))
                 (gr_line (start 100 100) (end 0 100) (layer "Edge.Cuts"))
                 (gr_line (start 0 100) (end 0 0) (layer "Edge.Cuts")))"#,
            "kicad_pcb",
        )
        .unwrap()
    }

    #[test]
    fn parses_components_and_nets() {
        let doc = sample_doc();
        let dm = DesignModel::from_document(&doc).unwrap();
        assert_eq!(dm.components.len(), 1);
        assert_eq!(dm.components[0].pos, Point::new(10.0, 20.0));
        assert_eq!(dm.nets.name(1), Some("GND"));
    }

    #[test]
    fn outline_bounds_from_edge_cuts() {
        let doc = sample_doc();
        let dm = DesignModel::from_document(&doc).unwrap();
        assert_eq!(dm.outline.rect.w(), 100.0);
        assert_eq!(dm.outline.rect.h(), 100.0);
    }

    #[test]
    fn add_segment_writes_back() {
        let mut doc = sample_doc();
        add_segment(
            &mut doc,
            &Trace { start: Point::zero(), end: Point::new(1.0, 1.0), width: 0.25, layer: Layer::FrontCopper, net: 1 },
        );
        assert_eq!(doc.root().find_all("segment").len(), 1);
        remove_net_routing(&mut doc, 1);
        assert_eq!(doc.root().find_all("segment").len(), 0);
    }
}
