//! Pure conversions from raw form shapes into canonical patch values.
//!
//! Everything here is deterministic and side-effect free (except temporary
//! link ids, which draw a fresh uuid). Malformed input never panics: it
//! normalizes to an empty/`None` value instead.

pub mod dates;
pub mod lists;

pub use dates::{to_date_only_input_value, to_timestamp_or_null};
pub use lists::{
    CustomFieldFormItem, CustomFieldItem, LOCAL_LINK_ID_PREFIX, Link, LinkFormItem,
    are_custom_field_lists_equal, are_link_lists_equal, build_local_links,
    find_invalid_custom_field_index, find_invalid_link_index, is_local_link_id,
    next_custom_field_rank, normalize_custom_field_list, normalize_link_list,
    to_custom_field_form_items, to_link_form_items,
};

/// Trims `raw`; an empty result becomes `None`.
pub fn normalize_optional_text(raw: Option<&str>) -> Option<String> {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Trims every tag, drops empties and collapses duplicates keeping the
/// first-seen order.
pub fn normalize_tag_list<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(raw.len());
    for tag in raw {
        let tag = tag.as_ref().trim();
        if tag.is_empty() || result.iter().any(|seen| seen == tag) {
            continue;
        }
        result.push(tag.to_string());
    }
    result
}
