//! # Repository Name Resolution
//!
//! Deterministic mapping from a human-readable group or student name to a
//! platform-safe repository identifier.
//!
//! Resolution is pure and total: any input string produces exactly one
//! identifier, and the same input always produces the same identifier. This
//! is what makes re-running a batch safe — a group's repository is found
//! again on the next run only if its name resolves to the same identifier
//! every time.

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
///
/// The replacement is ASCII-only and 1:1 per character: non-ASCII characters
/// are replaced, never transliterated, so the result is independent of
/// locale. Applying `sanitize` to its own output yields the output unchanged.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Resolve a display name to its repository identifier.
///
/// The identifier is the template slug, a `-` separator, and the sanitized
/// display name: `resolve("Ex1", "Team A!")` is `"Ex1-Team_A_"`.
pub fn resolve(template_slug: &str, display_name: &str) -> String {
    format!("{}-{}", template_slug, sanitize(display_name))
}
