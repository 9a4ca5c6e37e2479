use serde_json::Value;
use tracing::warn;

use flashfusion_core::types::Edge;

use crate::context::ContextDelta;

/// Pick the next edge out of a node.
///
/// Zero outgoing edges end the walk. A single outgoing edge is taken
/// unconditionally. Several outgoing edges are a condition node's
/// branching point: the edge whose `source_handle` matches the node's
/// `condition_result` wins. When no handle matches, the first outgoing
/// edge in array order is taken as a permissive default.
pub fn find_next_edge<'a>(
    edges: &'a [Edge],
    current_id: &str,
    delta: &ContextDelta,
) -> Option<&'a Edge> {
    let outgoing: Vec<&Edge> = edges.iter().filter(|e| e.source == current_id).collect();

    if outgoing.is_empty() {
        return None;
    }
    if outgoing.len() == 1 {
        return Some(outgoing[0]);
    }

    if let Some(flag) = delta.get("condition_result").and_then(Value::as_bool) {
        let wanted = if flag { "true" } else { "false" };
        if let Some(edge) = outgoing
            .iter()
            .copied()
            .find(|e| e.source_handle.as_deref() == Some(wanted))
        {
            return Some(edge);
        }
    }

    warn!(
        node_id = current_id,
        "No branch handle matched, taking first outgoing edge"
    );
    Some(outgoing[0])
}
