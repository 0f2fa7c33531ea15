use super::normalize_optional_text;
use serde::{Deserialize, Serialize};

/// Prefix of ids assigned to links that the server has not seen yet.
pub const LOCAL_LINK_ID_PREFIX: &str = "local-link-";

/// A link row as edited in the inspector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkFormItem {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub url: String,
    pub kind: String,
}

impl LinkFormItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            url: url.into(),
            kind: kind.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Canonical link. The wire patch carries server ids only; the local patch
/// carries a temporary id for links the server has not assigned one to yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub url: String,
    pub kind: String,
}

/// A custom key/value row as edited in the inspector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldFormItem {
    pub rank: i64,
    pub title: String,
    pub value: String,
}

impl CustomFieldFormItem {
    pub fn new(rank: i64, title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            rank,
            title: title.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldItem {
    pub rank: i64,
    pub title: String,
    pub value: Option<String>,
}

/// Drops rows whose trimmed url is empty and trims url and title. Ids and
/// kinds pass through untouched.
pub fn normalize_link_list(raw: &[LinkFormItem]) -> Vec<Link> {
    raw.iter()
        .filter_map(|item| {
            let url = item.url.trim();
            if url.is_empty() {
                return None;
            }
            Some(Link {
                id: item.id.clone(),
                title: item.title.trim().to_string(),
                url: url.to_string(),
                kind: item.kind.clone(),
            })
        })
        .collect()
}

/// Order-sensitive structural equality; a missing id equals an empty id.
pub fn are_link_lists_equal(a: &[Link], b: &[Link]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(l, r)| {
            l.id.as_deref().unwrap_or_default() == r.id.as_deref().unwrap_or_default()
                && l.kind == r.kind
                && l.title == r.title
                && l.url == r.url
        })
}

/// Sorts by `(rank, original index)`, drops rows with an empty trimmed title
/// and reassigns dense ranks from 0.
pub fn normalize_custom_field_list(raw: &[CustomFieldFormItem]) -> Vec<CustomFieldItem> {
    let mut ordered: Vec<(usize, &CustomFieldFormItem)> = raw.iter().enumerate().collect();
    ordered.sort_by_key(|(index, item)| (item.rank, *index));

    ordered
        .into_iter()
        .filter_map(|(_, item)| {
            let title = item.title.trim();
            if title.is_empty() {
                return None;
            }
            Some((title.to_string(), normalize_optional_text(Some(item.value.as_str()))))
        })
        .enumerate()
        .map(|(rank, (title, value))| CustomFieldItem {
            rank: rank as i64,
            title,
            value,
        })
        .collect()
}

pub fn are_custom_field_lists_equal(a: &[CustomFieldItem], b: &[CustomFieldItem]) -> bool {
    let left = normalize_custom_field_list(&to_custom_field_form_items(a));
    let right = normalize_custom_field_list(&to_custom_field_form_items(b));
    left == right
}

pub fn to_link_form_items(links: &[Link]) -> Vec<LinkFormItem> {
    links
        .iter()
        .map(|link| LinkFormItem {
            id: link.id.clone(),
            title: link.title.clone(),
            url: link.url.clone(),
            kind: link.kind.clone(),
        })
        .collect()
}

pub fn to_custom_field_form_items(items: &[CustomFieldItem]) -> Vec<CustomFieldFormItem> {
    items
        .iter()
        .map(|item| CustomFieldFormItem {
            rank: item.rank,
            title: item.title.clone(),
            value: item.value.clone().unwrap_or_default(),
        })
        .collect()
}

/// Index of the first link row with an empty url.
pub fn find_invalid_link_index(items: &[LinkFormItem]) -> Option<usize> {
    items.iter().position(|item| item.url.trim().is_empty())
}

/// Index of the first custom field row with an empty title.
pub fn find_invalid_custom_field_index(items: &[CustomFieldFormItem]) -> Option<usize> {
    items.iter().position(|item| item.title.trim().is_empty())
}

/// Rank for a row appended after every existing row.
pub fn next_custom_field_rank(items: &[CustomFieldFormItem]) -> i64 {
    items
        .iter()
        .map(|item| item.rank)
        .max()
        .map_or(0, |rank| rank.saturating_add(1))
}

pub fn is_local_link_id(id: &str) -> bool {
    id.starts_with(LOCAL_LINK_ID_PREFIX)
}

/// Builds the local-cache shape of `next`: links that already carry an id keep
/// it, links without one get a temporary id.
pub fn build_local_links(next: &[Link]) -> Vec<Link> {
    next.iter()
        .map(|item| {
            let id = item
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("{LOCAL_LINK_ID_PREFIX}{}", uuid::Uuid::new_v4()));
            Link {
                id: Some(id),
                title: item.title.clone(),
                url: item.url.clone(),
                kind: item.kind.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(id: Option<&str>, title: &str, url: &str) -> Link {
        Link {
            id: id.map(str::to_string),
            title: title.to_string(),
            url: url.to_string(),
            kind: "web".to_string(),
        }
    }

    #[test]
    fn link_list_drops_empty_urls_and_trims() {
        let raw = vec![
            LinkFormItem::new(" A ", " http://x ", "web"),
            LinkFormItem::new("", "", "web"),
        ];
        assert_eq!(normalize_link_list(&raw), vec![link(None, "A", "http://x")]);
    }

    #[test]
    fn link_list_keeps_server_id_and_kind() {
        let raw = vec![LinkFormItem::new("Design", "https://s", "doc").with_id("l-1")];
        let links = normalize_link_list(&raw);
        assert_eq!(links[0].id.as_deref(), Some("l-1"));
        assert_eq!(links[0].kind, "doc");
    }

    #[test]
    fn link_equality_is_order_sensitive() {
        let a = vec![link(Some("1"), "a", "u1"), link(Some("2"), "b", "u2")];
        let mut b = a.clone();
        assert!(are_link_lists_equal(&a, &b));
        b.reverse();
        assert!(!are_link_lists_equal(&a, &b));
        assert!(are_link_lists_equal(
            &[link(None, "a", "u")],
            &[link(Some(""), "a", "u")]
        ));
    }

    #[test]
    fn custom_fields_are_sorted_and_ranks_densified() {
        let raw = vec![
            CustomFieldFormItem::new(5, "b", ""),
            CustomFieldFormItem::new(1, "a", "x"),
        ];
        assert_eq!(
            normalize_custom_field_list(&raw),
            vec![
                CustomFieldItem {
                    rank: 0,
                    title: "a".to_string(),
                    value: Some("x".to_string()),
                },
                CustomFieldItem {
                    rank: 1,
                    title: "b".to_string(),
                    value: None,
                },
            ]
        );
    }

    #[test]
    fn custom_field_ties_keep_input_order_and_drop_blank_titles() {
        let raw = vec![
            CustomFieldFormItem::new(2, "second", "2"),
            CustomFieldFormItem::new(2, "  ", "ignored"),
            CustomFieldFormItem::new(2, "third", " 3 "),
            CustomFieldFormItem::new(0, "first", "1"),
        ];
        let titles: Vec<_> = normalize_custom_field_list(&raw)
            .into_iter()
            .map(|item| (item.rank, item.title, item.value))
            .collect();
        assert_eq!(
            titles,
            vec![
                (0, "first".to_string(), Some("1".to_string())),
                (1, "second".to_string(), Some("2".to_string())),
                (2, "third".to_string(), Some("3".to_string())),
            ]
        );
    }

    #[test]
    fn custom_field_equality_ignores_sparse_ranks() {
        let sparse = vec![
            CustomFieldItem {
                rank: 10,
                title: "a".to_string(),
                value: Some("1".to_string()),
            },
            CustomFieldItem {
                rank: 40,
                title: "b".to_string(),
                value: None,
            },
        ];
        let dense = normalize_custom_field_list(&to_custom_field_form_items(&sparse));
        assert!(are_custom_field_lists_equal(&sparse, &dense));

        let mut changed = dense.clone();
        changed[1].value = Some("now set".to_string());
        assert!(!are_custom_field_lists_equal(&sparse, &changed));
    }

    #[test]
    fn invalid_rows_are_located() {
        let links = vec![
            LinkFormItem::new("ok", "u", "web"),
            LinkFormItem::new("bad", "  ", "web"),
        ];
        assert_eq!(find_invalid_link_index(&links), Some(1));

        let fields = vec![CustomFieldFormItem::new(0, " ", "v")];
        assert_eq!(find_invalid_custom_field_index(&fields), Some(0));
        assert_eq!(find_invalid_custom_field_index(&[]), None);
    }

    #[test]
    fn next_rank_follows_the_maximum() {
        assert_eq!(next_custom_field_rank(&[]), 0);
        let fields = vec![
            CustomFieldFormItem::new(3, "a", ""),
            CustomFieldFormItem::new(7, "b", ""),
        ];
        assert_eq!(next_custom_field_rank(&fields), 8);
    }

    #[test]
    fn local_links_keep_known_ids_and_mint_temporary_ones() {
        let next = vec![link(Some("srv-1"), "a2", "u1"), link(None, "new", "u2")];
        let local = build_local_links(&next);

        assert_eq!(local[0].id.as_deref(), Some("srv-1"));
        assert_eq!(local[0].title, "a2");
        let minted = local[1].id.as_deref().unwrap();
        assert!(is_local_link_id(minted));
        assert!(!is_local_link_id("srv-1"));
    }
}
