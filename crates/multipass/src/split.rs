//! Splits one ShaderToy text blob into a Common section and per-pass bodies.
//!
//! Pass boundaries are located by counting `void mainImage(...)` entry points.
//! A comment marker (`// Buffer A` .. `// Buffer D`, `// Image`) within the
//! five lines above an entry point names the pass; unmarked passes fall back
//! to textual order with the last entry point taking the Image role.

use crate::{PassKind, MAX_PASSES};

/// How far above an entry point a role marker comment is honoured.
const MARKER_SCAN_LINES: usize = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SplitError {
    /// No usable source text at all. A shader with zero entry points is not
    /// an error (it becomes a single Image pass); an empty blob is.
    #[error("shader source is empty")]
    EmptySource,
}

/// One pass carved out of the source blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSource {
    pub kind: PassKind,
    /// The pass's `mainImage` function with every helper defined after an
    /// earlier entry point concatenated in front, so later passes can call
    /// helpers introduced between earlier passes.
    pub body: String,
    /// Index of the entry point in textual order, before any were dropped.
    pub entry_index: usize,
}

/// A shader blob split into its shared prefix and ordered passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitShader {
    /// Code before the first entry point, shared by every pass.
    pub common: String,
    /// Passes in textual order. At most [`MAX_PASSES`]; never empty.
    pub passes: Vec<PassSource>,
}

impl SplitShader {
    /// Index of the Image pass, if one was assigned.
    pub fn image_index(&self) -> Option<usize> {
        self.passes
            .iter()
            .position(|pass| pass.kind == PassKind::Image)
    }
}

/// Splits raw shader text into common code and pass bodies.
///
/// Zero or one entry point yields a single Image pass containing the whole
/// text. More than [`MAX_PASSES`] entry points keeps the first four buffers
/// and the final entry point; the surplus in between is dropped.
pub fn split_source(source: &str) -> Result<SplitShader, SplitError> {
    if source.trim().is_empty() {
        return Err(SplitError::EmptySource);
    }

    let entries = entry_offsets(source);
    if entries.len() <= 1 {
        return Ok(SplitShader {
            common: String::new(),
            passes: vec![PassSource {
                kind: PassKind::Image,
                body: source.to_string(),
                entry_index: 0,
            }],
        });
    }

    // Anchor every entry at the start of its line so the split keeps the
    // `void mainImage` signature intact.
    let starts: Vec<usize> = entries
        .iter()
        .map(|&offset| line_start(source, offset))
        .collect();
    let ends: Vec<usize> = entries
        .iter()
        .enumerate()
        .map(|(index, &offset)| {
            function_end(source, offset).unwrap_or_else(|| {
                // Unbalanced braces; fall back to the next entry or EOF so a
                // truncated paste still produces something renderable.
                starts.get(index + 1).copied().unwrap_or(source.len())
            })
        })
        .collect();

    let kept = kept_entries(entries.len());
    let markers: Vec<Option<PassKind>> = kept
        .iter()
        .map(|&index| find_marker(source, starts[index]))
        .collect();
    let kinds = assign_kinds(&markers);

    if entries.len() > MAX_PASSES {
        tracing::warn!(
            entry_points = entries.len(),
            kept = kept.len(),
            "shader declares more passes than Buffer A-D plus Image; dropping the surplus"
        );
    }

    let common = source[..starts[0]].to_string();
    let passes = kept
        .iter()
        .zip(kinds)
        .map(|(&index, kind)| {
            let mut body = String::new();
            // Helper code trailing each earlier entry's function, in order.
            for earlier in 0..index {
                let helper_start = ends[earlier].min(source.len());
                let helper_end = starts
                    .get(earlier + 1)
                    .copied()
                    .unwrap_or(source.len());
                if helper_start < helper_end {
                    body.push_str(&source[helper_start..helper_end]);
                }
            }
            body.push_str(&source[starts[index]..ends[index]]);
            body.push('\n');
            PassSource {
                kind,
                body,
                entry_index: index,
            }
        })
        .collect();

    Ok(SplitShader { common, passes })
}

/// Offsets of the `void` keyword of every `void mainImage(` entry point.
fn entry_offsets(source: &str) -> Vec<usize> {
    let bytes = source.as_bytes();
    let mut offsets = Vec::new();
    for (index, _) in source.match_indices("mainImage") {
        // The next non-whitespace character must open the parameter list.
        let mut after = index + "mainImage".len();
        while after < bytes.len() && bytes[after].is_ascii_whitespace() {
            after += 1;
        }
        if after >= bytes.len() || bytes[after] != b'(' {
            continue;
        }
        // The previous token must be `void`.
        let mut before = index;
        while before > 0 && bytes[before - 1].is_ascii_whitespace() {
            before -= 1;
        }
        if before >= 4 && &source[before - 4..before] == "void" {
            let keyword = before - 4;
            let boundary_ok = keyword == 0 || !is_ident_byte(bytes[keyword - 1]);
            if boundary_ok {
                offsets.push(keyword);
            }
        }
    }
    offsets
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Entry indices that survive the pass cap: first four plus the final one.
fn kept_entries(count: usize) -> Vec<usize> {
    if count <= MAX_PASSES {
        (0..count).collect()
    } else {
        let mut kept: Vec<usize> = (0..MAX_PASSES - 1).collect();
        kept.push(count - 1);
        kept
    }
}

/// End offset (one past the closing brace) of the function starting at
/// `keyword_offset`, tracked with a comment- and string-aware brace scan.
fn function_end(source: &str, keyword_offset: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let open = source[keyword_offset..]
        .find('{')
        .map(|found| keyword_offset + found)?;

    let mut depth = 0usize;
    let mut index = open;
    while index < bytes.len() {
        match bytes[index] {
            b'/' if bytes.get(index + 1) == Some(&b'/') => {
                while index < bytes.len() && bytes[index] != b'\n' {
                    index += 1;
                }
            }
            b'/' if bytes.get(index + 1) == Some(&b'*') => {
                index += 2;
                while index + 1 < bytes.len() && !(bytes[index] == b'*' && bytes[index + 1] == b'/')
                {
                    index += 1;
                }
                index = (index + 2).min(bytes.len());
            }
            b'"' => {
                index += 1;
                while index < bytes.len() && bytes[index] != b'"' {
                    index += if bytes[index] == b'\\' { 2 } else { 1 };
                }
                index += 1;
            }
            b'{' => {
                depth += 1;
                index += 1;
            }
            b'}' => {
                depth -= 1;
                index += 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => index += 1,
        }
    }
    None
}

fn line_start(source: &str, offset: usize) -> usize {
    source[..offset]
        .rfind('\n')
        .map(|found| found + 1)
        .unwrap_or(0)
}

/// Scans up to [`MARKER_SCAN_LINES`] lines above `entry_line_start` for a
/// role marker comment.
fn find_marker(source: &str, entry_line_start: usize) -> Option<PassKind> {
    let prefix = &source[..entry_line_start];
    prefix
        .lines()
        .rev()
        .take(MARKER_SCAN_LINES)
        .find_map(parse_marker)
}

/// Parses a single line as a role marker comment, case-insensitively.
fn parse_marker(line: &str) -> Option<PassKind> {
    let comment = line.trim().strip_prefix("//")?;
    let text = comment.trim_matches(|ch: char| ch == '-' || ch == '=' || ch.is_whitespace());
    let lowered = text.to_ascii_lowercase();
    if lowered == "image" {
        return Some(PassKind::Image);
    }
    let letter = lowered.strip_prefix("buffer")?.trim();
    match letter {
        "a" => Some(PassKind::BufferA),
        "b" => Some(PassKind::BufferB),
        "c" => Some(PassKind::BufferC),
        "d" => Some(PassKind::BufferD),
        _ => None,
    }
}

/// Resolves marker gaps: unmarked entries take the next free buffer letter in
/// textual order (capped at D), and the final unmarked entry takes Image when
/// no entry claimed it explicitly.
fn assign_kinds(markers: &[Option<PassKind>]) -> Vec<PassKind> {
    let has_image = markers.iter().flatten().any(|&kind| kind == PassKind::Image);
    let mut taken: Vec<PassKind> = markers.iter().flatten().copied().collect();
    let mut kinds = Vec::with_capacity(markers.len());
    let last = markers.len() - 1;

    for (index, marker) in markers.iter().enumerate() {
        let kind = match marker {
            Some(kind) => *kind,
            None if index == last && !has_image => PassKind::Image,
            None => {
                let next = PassKind::BUFFERS
                    .iter()
                    .copied()
                    .find(|kind| !taken.contains(kind))
                    .unwrap_or(PassKind::BufferD);
                taken.push(next);
                next
            }
        };
        kinds.push(kind);
    }
    kinds
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PASS: &str = r#"
vec3 palette(float t) { return vec3(t); }

// Buffer A
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    fragColor = vec4(palette(0.5), 1.0);
}

float ripple(vec2 p) { return sin(p.x) * cos(p.y); }

// Image
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    fragColor = vec4(ripple(fragCoord), 0.0, 0.0, 1.0);
}
"#;

    #[test]
    fn empty_source_is_rejected() {
        assert_eq!(split_source("   \n\t"), Err(SplitError::EmptySource));
    }

    #[test]
    fn single_entry_point_becomes_image_pass() {
        let source = "void mainImage(out vec4 c, in vec2 f) { c = vec4(1.0); }";
        let split = split_source(source).unwrap();
        assert_eq!(split.passes.len(), 1);
        assert_eq!(split.passes[0].kind, PassKind::Image);
        assert!(split.common.is_empty());
        assert_eq!(split.passes[0].body, source);
    }

    #[test]
    fn no_entry_point_still_yields_image_pass() {
        let split = split_source("float helper() { return 1.0; }").unwrap();
        assert_eq!(split.passes.len(), 1);
        assert_eq!(split.passes[0].kind, PassKind::Image);
    }

    #[test]
    fn markers_assign_pass_kinds() {
        let split = split_source(TWO_PASS).unwrap();
        assert_eq!(split.passes.len(), 2);
        assert_eq!(split.passes[0].kind, PassKind::BufferA);
        assert_eq!(split.passes[1].kind, PassKind::Image);
    }

    #[test]
    fn common_section_precedes_first_entry() {
        let split = split_source(TWO_PASS).unwrap();
        assert!(split.common.contains("palette"));
        assert!(!split.common.contains("mainImage"));
        assert!(!split.common.contains("ripple"));
    }

    #[test]
    fn later_pass_inherits_helpers_defined_between_entries() {
        let split = split_source(TWO_PASS).unwrap();
        let image = &split.passes[1];
        assert!(image.body.contains("float ripple"));
        // The helper must precede the pass's own entry point.
        let helper_at = image.body.find("float ripple").unwrap();
        let entry_at = image.body.find("void mainImage").unwrap();
        assert!(helper_at < entry_at);
        // Earlier entry-point bodies never leak into a later pass.
        assert!(!image.body.contains("palette(0.5)"));
    }

    #[test]
    fn unmarked_entries_fall_back_to_textual_order() {
        let source = r#"
void mainImage(out vec4 c, in vec2 f) { c = vec4(0.0); }
void mainImage(out vec4 c, in vec2 f) { c = vec4(1.0); }
void mainImage(out vec4 c, in vec2 f) { c = vec4(2.0); }
"#;
        let split = split_source(source).unwrap();
        let kinds: Vec<PassKind> = split.passes.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![PassKind::BufferA, PassKind::BufferB, PassKind::Image]);
    }

    #[test]
    fn pass_count_caps_at_five() {
        let entry = "void mainImage(out vec4 c, in vec2 f) { c = vec4(0.0); }\n";
        let source = entry.repeat(7);
        let split = split_source(&source).unwrap();
        assert_eq!(split.passes.len(), MAX_PASSES);
        assert_eq!(split.passes.last().unwrap().kind, PassKind::Image);
        assert_eq!(
            split.passes.last().unwrap().entry_index,
            6,
            "the final entry point keeps the Image role"
        );
    }

    #[test]
    fn explicit_image_marker_overrides_position() {
        let source = r#"
// Image
void mainImage(out vec4 c, in vec2 f) { c = vec4(0.0); }

// Buffer A
void mainImage(out vec4 c, in vec2 f) { c = vec4(1.0); }
"#;
        let split = split_source(source).unwrap();
        assert_eq!(split.passes[0].kind, PassKind::Image);
        assert_eq!(split.passes[1].kind, PassKind::BufferA);
    }

    #[test]
    fn marker_is_case_insensitive_and_tolerates_rulers() {
        assert_eq!(parse_marker("// ---- BUFFER B ----"), Some(PassKind::BufferB));
        assert_eq!(parse_marker("//image"), Some(PassKind::Image));
        assert_eq!(parse_marker("// buffer e"), None);
        assert_eq!(parse_marker("not a comment"), None);
    }

    #[test]
    fn marker_beyond_scan_window_is_ignored(){
        let source = format!(
            "// Buffer C\n{}void mainImage(out vec4 c, in vec2 f) {{ c = vec4(0.0); }}\nvoid mainImage(out vec4 c, in vec2 f) {{ c = vec4(1.0); }}\n",
            "\n".repeat(MARKER_SCAN_LINES + 1)
        );
        let split = split_source(&source).unwrap();
        assert_eq!(split.passes[0].kind, PassKind::BufferA);
    }

    #[test]
    fn braces_inside_comments_do_not_break_function_scan() {
        let source = r#"
void mainImage(out vec4 c, in vec2 f) {
    // stray brace } in a comment
    /* and { another */
    c = vec4(0.0);
}
float after() { return 2.0; }
void mainImage(out vec4 c, in vec2 f) { c = vec4(after()); }
"#;
        let split = split_source(source).unwrap();
        assert_eq!(split.passes.len(), 2);
        assert!(split.passes[1].body.contains("float after"));
    }

    #[test]
    fn commented_entry_points_are_not_counted_twice() {
        // `mainImage` mentioned without a `void` prefix is not an entry point.
        let source = r#"
// call mainImage ( below )
vec4 wrap_mainImage(vec2 f) { return vec4(f, 0.0, 1.0); }
void mainImage(out vec4 c, in vec2 f) { c = wrap_mainImage(f); }
"#;
        let split = split_source(source).unwrap();
        assert_eq!(split.passes.len(), 1);
    }
}
