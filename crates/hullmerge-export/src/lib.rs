//! hullmerge-export: Pure format serializers (sans-IO)
//!
//! Renders merged fragments for visual inspection. Currently supports SVG.

pub mod svg;

pub use svg::{SvgMetadata, build_path_data, to_svg};
