//! Task catalog reader.
//!
//! Task documents were authored inconsistently: newer records carry
//! structured fields, older ones pack a whole task into an array under a
//! `task*` key, mixing title, description, image, reward and url in any
//! order. The reader normalizes both shapes into [`Task`] values and tags
//! legacy records so they can be migrated; classification of array elements
//! is first-match-wins per category and an element is never claimed twice.

use std::sync::Arc;
use tracing::warn;

use crate::Amount;
use crate::model::{Task, TaskSource};
use crate::store::Collection;

/// Raw task document as stored: an arbitrary field map.
pub type TaskDoc = serde_json::Value;

/// Read-side of the task store.
pub struct Catalog {
    tasks: Arc<Collection<TaskDoc>>,
}

impl Catalog {
    pub fn new(tasks: Arc<Collection<TaskDoc>>) -> Self {
        Self { tasks }
    }

    /// All tasks currently offered to users (`available == true`).
    /// Display order is not guaranteed.
    pub async fn list_available_tasks(&self) -> Vec<Task> {
        let mut out = Vec::new();
        for (id, doc) in self.tasks.all().await {
            for task in normalize_doc(&id, &doc) {
                if task.available {
                    out.push(task);
                }
            }
        }
        out
    }
}

/// Normalize one stored document into zero or more tasks.
///
/// A document with any structured field yields one task; otherwise every
/// `task*` array field yields one legacy task with the composite id
/// `<doc>_<key>`.
pub fn normalize_doc(doc_id: &str, doc: &TaskDoc) -> Vec<Task> {
    let Some(fields) = doc.as_object() else {
        return Vec::new();
    };

    let structured = ["title", "reward", "description", "image", "url"]
        .iter()
        .any(|key| fields.get(*key).is_some_and(is_truthy));

    if structured {
        return vec![normalize_structured(doc_id, fields)];
    }

    let mut out = Vec::new();
    for (key, value) in fields {
        let is_task_key = key
            .get(..4)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("task"));
        if let (true, Some(items)) = (is_task_key, value.as_array()) {
            let id = format!("{doc_id}_{key}");
            warn!(task = %id, "legacy array-encoded task; flag for manual cleanup");
            out.push(parse_task_array(id, items));
        }
    }
    out
}

fn normalize_structured(doc_id: &str, fields: &serde_json::Map<String, TaskDoc>) -> Task {
    let string_field = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| fields.get(*k))
            .filter_map(|v| v.as_str())
            .find(|s| !s.is_empty())
            .map(str::to_owned)
    };

    Task {
        id: doc_id.to_owned(),
        title: string_field(&["title", "name"]).unwrap_or_else(|| "Untitled Task".to_owned()),
        description: string_field(&["description", "taskDescription"]),
        image: string_field(&["image", "imageUrl", "taskImage"]),
        reward: fields.get("reward").and_then(parse_number).unwrap_or(Amount::ZERO),
        url: string_field(&["url", "link"]),
        available: match fields.get("available") {
            None => true,
            Some(v) => is_truthy(v),
        },
        source: TaskSource::Structured,
    }
}

/// Reconstruct a task from a legacy heterogeneous array.
///
/// Single scan classification, in order: the first number-like element is
/// the reward, the first unclaimed url-like string is the url, the first
/// still-unclaimed image-like string is the image. Remaining elements
/// become the title (first) and description (rest, space-joined).
fn parse_task_array(id: String, items: &[TaskDoc]) -> Task {
    let reward_idx = items.iter().position(|v| parse_number(v).is_some());
    let url_idx = items
        .iter()
        .enumerate()
        .position(|(i, v)| Some(i) != reward_idx && is_url_like(v));
    let image_idx = items.iter().enumerate().position(|(i, v)| {
        Some(i) != reward_idx && Some(i) != url_idx && is_image_like(v)
    });

    let reward = reward_idx
        .and_then(|i| parse_number(&items[i]))
        .unwrap_or(Amount::ZERO);
    let url = url_idx.and_then(|i| items[i].as_str()).map(str::to_owned);
    let image = image_idx.and_then(|i| items[i].as_str()).map(str::to_owned);

    let claimed = [reward_idx, url_idx, image_idx];
    let leftovers: Vec<String> = items
        .iter()
        .enumerate()
        .filter(|(i, _)| !claimed.contains(&Some(*i)))
        .map(|(_, v)| display_string(v))
        .collect();

    let mut title = leftovers.first().cloned().unwrap_or_default();
    let description = if leftovers.len() >= 2 {
        Some(leftovers[1..].join(" "))
    } else {
        None
    };

    if title.is_empty() {
        if let Some(first) = items.first().and_then(|v| v.as_str()) {
            title = first.to_owned();
        }
    }
    if title.is_empty() {
        title = "Untitled Task".to_owned();
    }

    Task {
        id,
        title,
        description,
        image,
        reward,
        url,
        available: true,
        source: TaskSource::LegacyArray,
    }
}

fn parse_number(value: &TaskDoc) -> Option<Amount> {
    match value {
        TaskDoc::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(Amount::from_float),
        TaskDoc::String(s) if !s.is_empty() => {
            s.parse::<f64>().ok().filter(|f| f.is_finite()).map(Amount::from_float)
        }
        _ => None,
    }
}

fn is_url_like(value: &TaskDoc) -> bool {
    value.as_str().is_some_and(|s| {
        s.starts_with("http") || s.starts_with("www.") || s.contains('/')
    })
}

fn is_image_like(value: &TaskDoc) -> bool {
    const EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".webp"];
    value.as_str().is_some_and(|s| {
        let lower = s.to_ascii_lowercase();
        EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
            || s.starts_with("https")
            || s.contains("cdn")
            || s.contains("uploads")
    })
}

fn display_string(value: &TaskDoc) -> String {
    match value {
        TaskDoc::String(s) => s.clone(),
        TaskDoc::Null => String::new(),
        other => other.to_string(),
    }
}

/// JS-style truthiness for loosely-typed stored fields.
fn is_truthy(value: &TaskDoc) -> bool {
    match value {
        TaskDoc::Null => false,
        TaskDoc::Bool(b) => *b,
        TaskDoc::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        TaskDoc::String(s) => !s.is_empty(),
        TaskDoc::Array(_) | TaskDoc::Object(_) => true,
    }
}
