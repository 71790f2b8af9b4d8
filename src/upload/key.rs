//! Object key builder
//!
//! Resolves a profile's path template into the final storage key by plain
//! substitution. Templates are opaque strings; there is no escaping or
//! nesting, and unresolved placeholders pass through verbatim (templates
//! are validated at config load, so this only happens for templates that
//! bypassed validation).

/// Build an object key from a path template.
///
/// Substitution order:
/// 1. `{key_base}` and `{ext}` are replaced literally.
/// 2. With a non-empty shard, `{shard?}` and `{shard}` become the shard.
/// 3. With an empty shard, `{shard?}` is removed together with one
///    adjacent path separator so no empty segment remains.
///
/// Pure and total: identical inputs always yield identical output.
pub fn build_object_key(template: &str, key_base: &str, ext: &str, shard: &str) -> String {
    let mut object_key = template
        .replace("{key_base}", key_base)
        .replace("{ext}", ext);

    if shard.is_empty() {
        object_key = object_key
            .replace("/{shard?}", "")
            .replace("{shard?}/", "")
            .replace("{shard?}", "");
    } else {
        object_key = object_key
            .replace("{shard?}", shard)
            .replace("{shard}", shard);
    }

    object_key
}
