//! Serializes a map's retained layers to a standalone SVG document.

use std::fmt::Write as _;

use foundation::math::format_fixed;
use layers::layer::Layer;
use layers::subunits::SUBUNITS_CLASS;
use scene::element::{Shape, VisualElement};
use scene::style::Style;
use serde_json::Value;

use crate::map::Datamap;

/// Escapes text for use in element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn num(v: f64) -> String {
    format_fixed(v, 2)
}

fn style_attrs(style: &Style) -> String {
    let mut out = String::new();
    let mut attr = |name: &str, value: String| {
        let _ = write!(out, " {name}=\"{}\"", escape(&value));
    };
    if let Some(v) = &style.fill {
        attr("fill", v.clone());
    }
    if let Some(v) = &style.stroke {
        attr("stroke", v.clone());
    }
    if let Some(v) = style.stroke_width {
        attr("stroke-width", num(v));
    }
    if let Some(v) = style.stroke_opacity {
        attr("stroke-opacity", num(v));
    }
    if let Some(v) = style.fill_opacity {
        attr("fill-opacity", num(v));
    }
    if let Some(v) = style.opacity {
        attr("opacity", num(v));
    }
    if let Some(v) = &style.filter {
        attr("filter", v.clone());
    }
    if let Some(v) = style.font_size {
        attr("font-size", num(v));
    }
    if let Some(v) = &style.font_family {
        attr("font-family", v.clone());
    }
    if let Some(v) = &style.stroke_linecap {
        attr("stroke-linecap", v.clone());
    }
    if let Some(p) = style.dash_progress {
        attr("pathLength", "1".to_string());
        attr("stroke-dasharray", "1".to_string());
        attr("stroke-dashoffset", num(1.0 - p.clamp(0.0, 1.0)));
    }
    out
}

fn write_element(out: &mut String, element: &VisualElement, with_info: bool) {
    let class = escape(&element.class);
    let style = style_attrs(&element.state.style);
    let info = match (&element.datum, with_info) {
        (Value::Null, _) | (_, false) => String::new(),
        (datum, true) => format!(" data-info=\"{}\"", escape(&datum.to_string())),
    };
    let _ = match &element.state.shape {
        Shape::Path { d } => writeln!(out, "<path class=\"{class}\" d=\"{}\"{style}{info}/>", escape(d)),
        Shape::Circle { cx, cy, r } => writeln!(
            out,
            "<circle class=\"{class}\" cx=\"{}\" cy=\"{}\" r=\"{}\"{style}{info}/>",
            num(*cx),
            num(*cy),
            num(*r)
        ),
        Shape::Text { x, y, text } => writeln!(
            out,
            "<text class=\"{class}\" x=\"{}\" y=\"{}\"{style}>{}</text>",
            num(*x),
            num(*y),
            escape(text)
        ),
        Shape::Line { x1, y1, x2, y2 } => writeln!(
            out,
            "<line class=\"{class}\" x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\"{style}/>",
            num(*x1),
            num(*y1),
            num(*x2),
            num(*y2)
        ),
        Shape::Rect { x, y, width, height } => writeln!(
            out,
            "<rect class=\"{class}\" x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"{style}/>",
            num(*x),
            num(*y),
            num(*width),
            num(*height)
        ),
    };
}

fn write_layer(out: &mut String, layer: &Layer) {
    let transform = if layer.scale == 1.0 {
        String::new()
    } else {
        format!(" transform=\"scale({})\"", num(layer.scale))
    };
    let _ = writeln!(out, "<g class=\"{}\"{transform}>", escape(&layer.class));
    let with_info = layer.class == SUBUNITS_CLASS;
    for element in layer.elements.iter() {
        write_element(out, element, with_info);
    }
    out.push_str("</g>\n");
}

/// Renders every layer in paint order, using each element's displayed
/// state. Call after `settle` for the final picture.
pub fn render_document(map: &Datamap) -> String {
    let vp = map.viewport();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" class=\"datamap\" width=\"{}\" height=\"{}\" data-width=\"{}\" style=\"overflow: hidden\">",
        num(vp.width),
        num(vp.height),
        num(vp.width)
    );
    for layer in map.layers().iter() {
        write_layer(&mut out, layer);
    }
    out.push_str("</svg>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::{escape, render_document};
    use crate::map::Datamap;
    use crate::options::MapOptions;
    use formats::topology::Topology;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const TOPOLOGY: &str = r#"{
        "type": "Topology",
        "objects": {
            "world": {
                "type": "GeometryCollection",
                "geometries": [
                    {"type": "Polygon", "id": "AAA", "properties": {"name": "A & B"}, "arcs": [[0]]}
                ]
            }
        },
        "arcs": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]
    }"#;

    fn map(options: serde_json::Value) -> Datamap {
        let topology = Topology::from_json_str(TOPOLOGY).unwrap();
        let mut map = Datamap::new(MapOptions::from_json_value(options).unwrap(), topology).unwrap();
        map.draw().unwrap();
        map
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn document_has_root_and_region_paths() {
        let map = map(json!({"data": {"AAA": {"fillKey": "defaultFill", "n": 1}}}));
        let svg = render_document(&map);
        assert!(svg.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\" class=\"datamap\" width=\"960\" height=\"540\""));
        assert!(svg.contains("<g class=\"datamaps-subunits\">"));
        assert!(svg.contains("<path class=\"datamaps-subunit AAA\" d=\"M"));
        assert!(svg.contains("fill=\"#ABDDA4\""));
        assert!(svg.contains("data-info=\"{&quot;fillKey&quot;:&quot;defaultFill&quot;,&quot;n&quot;:1}\""));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn layers_carry_scale_and_overlays() {
        let mut map = map(json!({"responsive": true}));
        map.bubbles(json!([{"radius": 5, "latitude": 5, "longitude": 5}]), None)
            .unwrap();
        map.settle();
        map.resize(480.0);
        let svg = render_document(&map);
        assert!(svg.contains("<g class=\"datamaps-subunits\" transform=\"scale(0.5)\">"));
        assert!(svg.contains("<g class=\"bubbles\" transform=\"scale(0.5)\">"));
        assert!(svg.contains("r=\"5\""));
    }

    #[test]
    fn arcs_render_dash_progress() {
        let mut map = map(json!({}));
        map.arc(
            json!([{"origin": {"latitude": 0, "longitude": 0}, "destination": {"latitude": 5, "longitude": 40}}]),
            None,
        )
        .unwrap();
        map.settle();
        let svg = render_document(&map);
        assert!(svg.contains("pathLength=\"1\" stroke-dasharray=\"1\" stroke-dashoffset=\"0\""));
        assert!(svg.contains("fill=\"none\""));
    }
}
