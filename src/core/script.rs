//! Per-pixel scripts (evalscript V3) sent with render requests.
//!
//! Radar classification scripts are generated from a `RuleTable`, so the
//! remote cascade is the same ordered table the local classifier evaluates.
use std::fmt::Write;

use crate::core::classification::{CLASS_SCALE, Condition, RuleTable};
use crate::types::Polarization;

const HEADER: &str = "//VERSION=3\n";

fn js_number(v: f64) -> String {
    format!("{:.2}", v)
}

fn condition_js(c: &Condition) -> String {
    match *c {
        Condition::VhBelow(t) => format!("vh < {}", js_number(t)),
        Condition::VhAbove(t) => format!("vh > {}", js_number(t)),
        Condition::RatioBelow(t) => format!("(vv - vh) < {}", js_number(t)),
    }
}

/// Render the ordered cascade as a JS function `classify(vv, vh)` over dB values.
pub fn cascade_js(table: &RuleTable) -> String {
    let mut js = String::from("function classify(vv, vh) {\n");
    for rule in &table.rules {
        let cond = rule
            .conditions
            .iter()
            .map(condition_js)
            .collect::<Vec<_>>()
            .join(" && ");
        let _ = writeln!(js, "  if ({}) return {}; // {}", cond, rule.class.code(), rule.class);
    }
    let _ = writeln!(js, "  return {}; // {}", table.default.code(), table.default);
    js.push_str("}\n");
    js
}

/// Classification script: one UINT8 band holding class × 50, 0 for no-data.
pub fn classification_script(table: &RuleTable, co: Polarization) -> String {
    let cross = co.cross();
    let (co, cross) = (co.band_name(), cross.band_name());
    let mut js = String::from(HEADER);
    let _ = write!(
        js,
        r#"function setup() {{
  return {{
    input: [{{ bands: ["{co}", "{cross}", "dataMask"] }}],
    output: {{ bands: 1, sampleType: "UINT8" }}
  }};
}}

function toDb(v) {{
  return 10 * Math.log(v) / Math.LN10;
}}

"#
    );
    js.push_str(&cascade_js(table));
    let _ = write!(
        js,
        r#"
function evaluatePixel(s) {{
  if (s.dataMask === 0 || !(s.{co} > 0) || !(s.{cross} > 0)) {{
    return [0];
  }}
  return [classify(toDb(s.{co}), toDb(s.{cross})) * {CLASS_SCALE}];
}}
"#
    );
    js
}

/// Raw linear power for statistics: FLOAT32 `[co, cross, dataMask]` (or `[co, dataMask]`).
pub fn radar_statistics_script(pols: &[Polarization]) -> String {
    let bands: Vec<&str> = pols.iter().map(|p| p.band_name()).collect();
    let input = bands
        .iter()
        .map(|b| format!("\"{b}\""))
        .chain(std::iter::once("\"dataMask\"".to_string()))
        .collect::<Vec<_>>()
        .join(", ");
    let output = bands
        .iter()
        .map(|b| format!("s.{b}"))
        .chain(std::iter::once("s.dataMask".to_string()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"{HEADER}function setup() {{
  return {{
    input: [{{ bands: [{input}] }}],
    output: {{ bands: {n}, sampleType: "FLOAT32" }}
  }};
}}

function evaluatePixel(s) {{
  return [{output}];
}}
"#,
        n = bands.len() + 1
    )
}

/// Grayscale dB backscatter stretched from [min_db, max_db] to [0, 1].
pub fn radar_backscatter_script(pol: Polarization, min_db: f64, max_db: f64) -> String {
    let band = pol.band_name();
    let (lo, hi) = (js_number(min_db), js_number(max_db));
    format!(
        r#"{HEADER}function setup() {{
  return {{
    input: [{{ bands: ["{band}", "dataMask"] }}],
    output: {{ bands: 2 }}
  }};
}}

function evaluatePixel(s) {{
  if (s.dataMask === 0 || !(s.{band} > 0)) {{
    return [0, 0];
  }}
  var db = 10 * Math.log(s.{band}) / Math.LN10;
  var v = (db - ({lo})) / (({hi}) - ({lo}));
  return [Math.max(0, Math.min(v, 1)), 1];
}}
"#
    )
}

/// Natural color from B04/B03/B02 with a non-linear contrast stretch.
pub fn true_color_script(max_value: f64, gamma: f64) -> String {
    let (max, gamma) = (js_number(max_value), js_number(gamma));
    format!(
        r#"{HEADER}function setup() {{
  return {{
    input: ["B04", "B03", "B02"],
    output: {{ bands: 3, sampleType: "AUTO" }}
  }};
}}

function stretch(value) {{
  var v = Math.pow(value / {max}, {gamma});
  return Math.max(0, Math.min(v, 1));
}}

function evaluatePixel(sample) {{
  return [stretch(sample.B04), stretch(sample.B03), stretch(sample.B02)];
}}
"#
    )
}

/// NDVI through a fixed color ramp (brown → yellow → green).
pub fn ndvi_script() -> String {
    format!(
        r#"{HEADER}function setup() {{
  return {{
    input: ["B04", "B08", "dataMask"],
    output: {{ bands: 4 }}
  }};
}}

var ramp = [
  [-0.2, [0.75, 0.75, 0.75]],
  [0.0, [0.65, 0.45, 0.25]],
  [0.2, [0.95, 0.90, 0.45]],
  [0.4, [0.55, 0.80, 0.30]],
  [0.6, [0.20, 0.60, 0.15]],
  [0.8, [0.05, 0.35, 0.05]]
];

function colorFor(v) {{
  var color = ramp[0][1];
  for (var i = 0; i < ramp.length; i++) {{
    if (v >= ramp[i][0]) {{
      color = ramp[i][1];
    }}
  }}
  return color;
}}

function evaluatePixel(s) {{
  var ndvi = (s.B08 - s.B04) / (s.B08 + s.B04);
  var c = colorFor(ndvi);
  return [c[0], c[1], c[2], s.dataMask];
}}
"#
    )
}

/// Highlight-optimized natural color: square-root stretch that keeps
/// bright surfaces from saturating.
pub fn highlight_script() -> String {
    format!(
        r#"{HEADER}function setup() {{
  return {{
    input: ["B04", "B03", "B02", "dataMask"],
    output: {{ bands: 4 }}
  }};
}}

function highlight(v) {{
  return Math.max(0, Math.min(Math.sqrt(v * 0.6) - 0.035, 1));
}}

function evaluatePixel(s) {{
  return [highlight(s.B04 * 2.5), highlight(s.B03 * 2.5), highlight(s.B02 * 2.5), s.dataMask];
}}
"#
    )
}
