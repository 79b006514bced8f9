//! Operation filtering
//!
//! Runs before pruning: drops operations that do not match, then drops path
//! items left without operations. Components are left alone; the pruner
//! removes whatever became unreachable.

use serde::Serialize;

use super::{Document, HttpMethod};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    /// `<method> <path>` of every removed operation
    pub removed_operations: Vec<String>,
    pub removed_paths: Vec<String>,
}

/// Keep operations carrying at least one of `tags`
pub fn retain_tags(doc: &mut Document, tags: &[String]) -> FilterReport {
    retain(doc, |op| op.tags.iter().any(|t| tags.contains(t)))
}

/// Keep operations whose operationId is listed
pub fn retain_operation_ids(doc: &mut Document, ids: &[String]) -> FilterReport {
    retain(doc, |op| {
        op.operation_id
            .as_ref()
            .is_some_and(|id| ids.contains(id))
    })
}

fn retain(doc: &mut Document, keep: impl Fn(&super::Operation) -> bool) -> FilterReport {
    let mut report = FilterReport::default();

    for (path, item) in doc.paths.iter_mut() {
        let dropped: Vec<HttpMethod> = item
            .operations
            .iter()
            .filter(|(_, op)| !keep(op))
            .map(|(m, _)| *m)
            .collect();
        for method in dropped {
            item.operations.shift_remove(&method);
            report
                .removed_operations
                .push(format!("{} {}", method.as_str(), path));
        }
    }

    doc.paths.retain(|path, item| {
        let keep = !item.operations.is_empty();
        if !keep {
            report.removed_paths.push(path.clone());
        }
        keep
    });

    report
}
