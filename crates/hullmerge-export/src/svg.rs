//! SVG export serializer.
//!
//! Renders merged fragments into an SVG string using the [`svg`] crate
//! for document construction, XML escaping, and path data formatting.
//!
//! Each fragment becomes a `<path>` through its source vertices, colored
//! by cycling through [`FRAGMENT_COLORS`] so neighbouring fragments are
//! told apart. The chord that replaces each fragment in the simplified
//! line is drawn as a dashed `<line>`, grouped under `<g id="chords">`.
//!
//! The `viewBox` is the bounding box of all fragment envelopes plus a
//! margin; coordinates are emitted untransformed.
//!
//! Optional [`SvgMetadata`] embeds `<title>`, `<desc>` and `<metadata>`
//! elements.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Group, Line, Path, Title};
use svg::node::{Node, Text, Value};

use hullmerge_core::{Fragment, Point};

/// Stroke colors cycled across fragments in range order.
pub const FRAGMENT_COLORS: [&str; 6] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b",
];

/// Margin around the drawing as a fraction of its larger extent.
const MARGIN_RATIO: f64 = 0.05;

/// Smallest margin, so degenerate (flat or single-point) drawings stay
/// visible.
const MIN_MARGIN: f64 = 1.0;

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped automatically by
/// the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized [`MergeConfig`](hullmerge_core::MergeConfig), emitted
    /// inside `<metadata>` wrapped in a namespaced `<hullmerge:config>`
    /// element so exported files record the settings that produced them.
    pub config_json: Option<&'a str>,
}

/// Build an SVG path `d` attribute string from a coordinate sequence.
///
/// Uses `M` for the first point and `L` for subsequent points.
/// Returns an empty string for fewer than 2 points.
///
/// # Examples
///
/// ```
/// use hullmerge_core::Point;
/// use hullmerge_export::build_path_data;
///
/// let d = build_path_data(&[Point::new(10.0, 20.0), Point::new(30.0, 40.0)]);
/// assert_eq!(d, "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(points: &[Point]) -> String {
    let [first, rest @ ..] = points else {
        return String::new();
    };
    if rest.is_empty() {
        return String::new();
    }

    let mut data = Data::new().move_to((first.x, first.y));
    for p in rest {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data))
}

/// `(min_x, min_y, width, height)` covering every fragment envelope plus
/// a margin.
fn view_box(fragments: &[Fragment]) -> (f64, f64, f64, f64) {
    let mut bounds: Option<([f64; 2], [f64; 2])> = None;
    for f in fragments {
        let (lo, hi) = (f.envelope().lower(), f.envelope().upper());
        bounds = Some(match bounds {
            None => (lo, hi),
            Some((min, max)) => (
                [min[0].min(lo[0]), min[1].min(lo[1])],
                [max[0].max(hi[0]), max[1].max(hi[1])],
            ),
        });
    }
    let Some((min, max)) = bounds else {
        return (0.0, 0.0, 0.0, 0.0);
    };

    let (width, height) = (max[0] - min[0], max[1] - min[1]);
    let margin = (width.max(height) * MARGIN_RATIO).max(MIN_MARGIN);
    (
        min[0] - margin,
        min[1] - margin,
        2.0f64.mul_add(margin, width),
        2.0f64.mul_add(margin, height),
    )
}

/// Serialize fragments into an SVG document string.
///
/// Fragments are drawn in range order. Fragments with fewer than two
/// coordinates produce neither a path nor a chord.
#[must_use]
pub fn to_svg(fragments: &[Fragment], metadata: &SvgMetadata<'_>) -> String {
    let mut ordered: Vec<&Fragment> = fragments.iter().collect();
    ordered.sort_by_key(|f| f.range());

    let mut doc = Document::new().set("viewBox", view_box(fragments));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut config_el = Element::new("hullmerge:config");
        config_el.assign("xmlns:hullmerge", "https://hullmerge.dev/ns/1");
        config_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(config_el);
        doc = doc.add(metadata_el);
    }

    let mut fragments_group = Group::new().set("id", "fragments");
    let mut chords_group = Group::new().set("id", "chords");

    for (k, fragment) in ordered.iter().enumerate() {
        let d = build_path_data(fragment.coordinates());
        if d.is_empty() {
            continue;
        }
        let range = fragment.range();
        let path = Path::new()
            .set("d", d)
            .set("fill", "none")
            .set("stroke", FRAGMENT_COLORS[k % FRAGMENT_COLORS.len()])
            .set("stroke-width", 2)
            .set("vector-effect", "non-scaling-stroke")
            .set("data-range", format!("{}-{}", range.i(), range.j()));
        fragments_group = fragments_group.add(path);

        if let Some(chord) = fragment.chord() {
            let line = Line::new()
                .set("x1", chord.start.x)
                .set("y1", chord.start.y)
                .set("x2", chord.end.x)
                .set("y2", chord.end.y)
                .set("stroke", "black")
                .set("stroke-width", 1)
                .set("stroke-dasharray", "4 2")
                .set("vector-effect", "non-scaling-stroke");
            chords_group = chords_group.add(line);
        }
    }

    doc = doc.add(fragments_group).add(chords_group);

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hullmerge_core::fragment::{fragments_at_indices, hull_geometry};
    use hullmerge_core::{Polyline, Range};

    use super::*;

    /// Shorthand: no metadata.
    fn no_meta() -> SvgMetadata<'static> {
        SvgMetadata::default()
    }

    fn corner() -> Vec<Fragment> {
        let line = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
        ]);
        fragments_at_indices(&line, &[1], &hull_geometry).unwrap()
    }

    // --- build_path_data ---

    #[test]
    fn build_path_data_empty() {
        assert_eq!(build_path_data(&[]), "");
    }

    #[test]
    fn build_path_data_single_point() {
        assert_eq!(build_path_data(&[Point::new(5.0, 5.0)]), "");
    }

    #[test]
    fn build_path_data_three_points() {
        let d = build_path_data(&[
            Point::new(10.0, 15.0),
            Point::new(12.5, 18.0),
            Point::new(14.0, 20.0),
        ]);
        assert_eq!(d, "M10,15 L12.5,18 L14,20");
    }

    // --- to_svg ---

    #[test]
    fn to_svg_structure() {
        let svg = to_svg(&corner(), &no_meta());
        assert!(svg.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<svg"));
        assert!(svg.contains("</svg>"));
        assert_eq!(svg.matches("<path").count(), 2);
        assert_eq!(svg.matches("<line").count(), 2);
        assert!(svg.contains(r#"data-range="0-1""#));
        assert!(svg.contains(r#"data-range="1-2""#));
    }

    #[test]
    fn to_svg_view_box_has_margin() {
        let svg = to_svg(&corner(), &no_meta());
        assert!(svg.contains(r#"viewBox="-1 -1 12 12""#), "{svg}");
    }

    #[test]
    fn to_svg_single_vertex_fragment_is_skipped() {
        let point = Fragment::new(
            vec![Point::new(3.0, 3.0)],
            Range::new(4, 4).unwrap(),
            &hull_geometry,
        )
        .unwrap();
        let svg = to_svg(&[point], &no_meta());
        assert!(!svg.contains("<path"));
        assert!(!svg.contains("<line"));
    }

    #[test]
    fn to_svg_empty_input() {
        let svg = to_svg(&[], &no_meta());
        assert!(svg.contains("<svg"));
        assert!(!svg.contains("<path"));
    }

    #[test]
    fn to_svg_colors_follow_range_order() {
        let mut fragments = corner();
        fragments.reverse();
        let svg = to_svg(&fragments, &no_meta());
        let first = svg.find(FRAGMENT_COLORS[0]).unwrap();
        let second = svg.find(FRAGMENT_COLORS[1]).unwrap();
        assert!(first < second);
        assert!(svg.find(r#"data-range="0-1""#).unwrap() < svg.find(r#"data-range="1-2""#).unwrap());
    }

    #[test]
    fn to_svg_metadata_is_escaped() {
        let meta = SvgMetadata {
            title: Some("a < b"),
            description: Some("threshold & size"),
            config_json: Some(r#"{"threshold":50.0}"#),
        };
        let svg = to_svg(&corner(), &meta);
        assert!(svg.contains("<title>a &lt; b</title>"));
        assert!(svg.contains("threshold &amp; size"));
        assert!(svg.contains("<hullmerge:config"));
        assert!(svg.contains("</hullmerge:config>"));
    }
}
