// Flattening of the nested category menu into ordered rows.

use crate::error::{HarvestError, Result};
use crate::model::Category;
use serde_json::Value;
use tracing::debug;

/// Menu entries with this id are promotional placeholders, not categories.
pub const PLACEHOLDER_CATEGORY_ID: &str = "markdown";

const REQUIRED_FIELDS: [&str; 3] = ["id", "title", "url"];

/// Flatten a category tree depth-first, pre-order.
///
/// Nodes with an empty or placeholder id are not emitted, but their children
/// are: those children keep their true depth and hang off the nearest emitted
/// ancestor. Any node lacking `id`, `title` or `url` fails the whole
/// flattening, so no partial list ever reaches the store.
pub fn flatten_categories(nodes: &[Value]) -> Result<Vec<Category>> {
    let mut categories = Vec::new();
    flatten_into(nodes, 0, None, &mut categories)?;
    Ok(categories)
}

fn flatten_into(
    nodes: &[Value],
    level: u32,
    parent_id: Option<&str>,
    out: &mut Vec<Category>,
) -> Result<()> {
    for node in nodes {
        for field in REQUIRED_FIELDS {
            if node.get(field).is_none() {
                return Err(HarvestError::Schema {
                    field: field.to_string(),
                    node: describe_node(node),
                });
            }
        }

        let children = children_of(node);
        let id = text_of(&node["id"]);

        if id.is_empty() || id == PLACEHOLDER_CATEGORY_ID {
            debug!("Skipping menu entry with id '{}'", id);
            flatten_into(children, level + 1, parent_id, out)?;
            continue;
        }

        out.push(Category {
            id: id.clone(),
            parent_id: parent_id.map(str::to_string),
            title: text_of(&node["title"]),
            level,
            relative_url: text_of(&node["url"]),
            has_children: !children.is_empty(),
        });

        flatten_into(children, level + 1, Some(&id), out)?;
    }
    Ok(())
}

// The menu API calls the child list `childs`; accept `children` as well.
fn children_of(node: &Value) -> &[Value] {
    node.get("childs")
        .or_else(|| node.get("children"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn describe_node(node: &Value) -> String {
    let text = node.to_string();
    if text.chars().count() > 120 {
        let head: String = text.chars().take(117).collect();
        format!("{head}...")
    } else {
        text
    }
}

