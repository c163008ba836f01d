// src/classifier.rs
//! Token-matching classifier that decides which showroom surface a vehicle mesh receives.
//!
//! Matching is a lower-cased substring search over the mesh name and its current material
//! name. Priority is fixed: interior suppression, then body, then glass, then trim.

/// Surface class picked for a mesh.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceClass {
    Body,
    Glass,
    Trim,
    /// Keep the authored material.
    Unchanged,
}

const BODY_TOKENS: &[&str] = &["body", "paint", "chassis", "exterior"];

const COLOR_TOKENS: &[&str] = &[
    "red", "blue", "black", "white", "silver", "grey", "gray", "yellow", "green", "orange",
];

const FINISH_TOKENS: &[&str] = &["metallic", "gloss", "matte", "pearl", "candy"];

const BODY_EXCLUSIONS: &[&str] = &["wheel", "tire", "brake", "glass", "window"];

const INTERIOR_TOKENS: &[&str] = &[
    "interior",
    "seat",
    "dashboard",
    "steering",
    "console",
    "leather",
    "plastic",
    "carpet",
];

const GLASS_TOKENS: &[&str] = &["glass", "window"];

const TRIM_TOKENS: &[&str] = &["rim", "trim", "grill", "chrome"];

#[inline]
fn contains_any(haystack: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|token| haystack.contains(token))
}

/// Whether the names mark an interior part. Interior parts never become body paint.
pub fn is_interior(mesh_name: &str, material_name: &str) -> bool {
    contains_any(&normalize(mesh_name, material_name), INTERIOR_TOKENS)
}

fn normalize(mesh_name: &str, material_name: &str) -> String {
    let mut key = String::with_capacity(mesh_name.len() + material_name.len() + 1);
    key.push_str(&mesh_name.to_lowercase());
    key.push(' ');
    key.push_str(&material_name.to_lowercase());
    key
}

/// Classify a mesh by its name and the name of the material it currently carries.
pub fn classify(mesh_name: &str, material_name: &str) -> SurfaceClass {
    let key = normalize(mesh_name, material_name);

    let interior = contains_any(&key, INTERIOR_TOKENS);
    let body_hint = contains_any(&key, BODY_TOKENS)
        || contains_any(&key, COLOR_TOKENS)
        || contains_any(&key, FINISH_TOKENS);

    if body_hint && !interior && !contains_any(&key, BODY_EXCLUSIONS) {
        return SurfaceClass::Body;
    }
    if contains_any(&key, GLASS_TOKENS) {
        return SurfaceClass::Glass;
    }
    if contains_any(&key, TRIM_TOKENS) {
        return SurfaceClass::Trim;
    }
    SurfaceClass::Unchanged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_tokens_select_paint() {
        assert_eq!(classify("Body_Main", ""), SurfaceClass::Body);
        assert_eq!(classify("mesh_042", "CarPaint"), SurfaceClass::Body);
        assert_eq!(classify("CHASSIS", "mat0"), SurfaceClass::Body);
        assert_eq!(classify("door_left", "silver_metallic"), SurfaceClass::Body);
    }

    #[test]
    fn interior_suppresses_body() {
        assert_eq!(classify("red_leather_seat", ""), SurfaceClass::Unchanged);
        assert_eq!(classify("body_panel", "interior_plastic"), SurfaceClass::Unchanged);
        assert!(is_interior("Dashboard", ""));
    }

    #[test]
    fn interior_does_not_suppress_glass_or_trim() {
        assert_eq!(classify("interior_window", ""), SurfaceClass::Glass);
        assert_eq!(classify("steering_chrome", ""), SurfaceClass::Trim);
    }

    #[test]
    fn glass_precedes_trim() {
        assert_eq!(classify("window_chrome_trim", ""), SurfaceClass::Glass);
        assert_eq!(classify("glass_trim", ""), SurfaceClass::Glass);
    }

    #[test]
    fn wheel_exclusion_defeats_body() {
        assert_ne!(classify("body_wheel", ""), SurfaceClass::Body);
        assert_eq!(classify("body_wheel", ""), SurfaceClass::Unchanged);
        assert_eq!(classify("black_tire", ""), SurfaceClass::Unchanged);
        assert_eq!(classify("wheel_rim", "black"), SurfaceClass::Trim);
    }

    #[test]
    fn body_tokens_with_glass_fall_through_to_glass() {
        assert_eq!(classify("body_glass", ""), SurfaceClass::Glass);
        assert_eq!(classify("rear", "window_paint"), SurfaceClass::Glass);
    }

    #[test]
    fn unknown_names_are_unchanged() {
        assert_eq!(classify("Object_17", "Material.003"), SurfaceClass::Unchanged);
        assert_eq!(classify("", ""), SurfaceClass::Unchanged);
    }

    #[test]
    fn deterministic_for_same_input() {
        let inputs = [
            ("Body", "paint"),
            ("window_chrome_trim", ""),
            ("red_leather_seat", ""),
            ("grill", "Chrome"),
        ];
        for (mesh, material) in inputs {
            let first = classify(mesh, material);
            for _ in 0..8 {
                assert_eq!(classify(mesh, material), first);
            }
        }
    }
}
