//! UI ports.
//!
//! The viewer never looks UI elements up by itself: the host hands it a
//! [`ViewerPorts`] with whichever sinks it has. Every port is optional and a
//! missing one turns the matching feature into a no-op.

use crate::scene::floors::FloorRecord;
use crate::scene::{NodeId, SceneGraph};
use crate::viewer::InteractionMode;

/// Loading overlay with a status line.
pub trait LoaderSink {
    fn show(&mut self, text: &str);
    fn hide(&mut self);
}

/// Floor status table; `highlighted` is the key of the hovered row.
pub trait StatusTable {
    fn render(&mut self, records: &[FloorRecord], highlighted: Option<&str>);
}

/// Details of the hovered floor, or the "no selection" placeholder for `None`.
pub trait MetadataPanel {
    fn show_record(&mut self, record: Option<&FloorRecord>);
}

/// The three mode buttons. Exactly one is marked selected.
pub trait ModeSelector {
    fn select(&mut self, mode: InteractionMode);
}

/// Collapsible model-browser panel. Returns the visibility after toggling.
pub trait PanelToggle {
    fn toggle(&mut self) -> bool;
}

/// Sub-tree list. Row callbacks go back through
/// [`Viewer::toggle_visibility`](crate::viewer::Viewer::toggle_visibility) and
/// [`Viewer::focus_node`](crate::viewer::Viewer::focus_node).
pub trait ModelBrowser {
    fn render(&mut self, list: &BrowserList);
    fn clear(&mut self);
}

#[derive(Default)]
pub struct ViewerPorts {
    pub loader: Option<Box<dyn LoaderSink>>,
    pub status_table: Option<Box<dyn StatusTable>>,
    pub metadata: Option<Box<dyn MetadataPanel>>,
    pub mode_selector: Option<Box<dyn ModeSelector>>,
    pub panel_toggle: Option<Box<dyn PanelToggle>>,
    pub browser: Option<Box<dyn ModelBrowser>>,
}

impl ViewerPorts {
    /// Names of the ports the host did not provide.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.loader.is_none() {
            missing.push("loader");
        }
        if self.status_table.is_none() {
            missing.push("status table");
        }
        if self.metadata.is_none() {
            missing.push("metadata panel");
        }
        if self.mode_selector.is_none() {
            missing.push("mode selector");
        }
        if self.panel_toggle.is_none() {
            missing.push("panel toggle");
        }
        if self.browser.is_none() {
            missing.push("model browser");
        }
        missing
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowserRow {
    pub node: NodeId,
    pub label: String,
    /// Depth below the listed root (direct children are 0).
    pub depth: usize,
    pub is_mesh: bool,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowserList {
    pub header: String,
    pub rows: Vec<BrowserRow>,
    /// Rows that matched but were cut by the item cap.
    pub omitted: usize,
    pub max_items: usize,
}

impl BrowserList {
    /// Meshes and named groups with children under `root`, pre-order,
    /// capped at `max_items`.
    pub fn build(graph: &SceneGraph, root: NodeId, max_items: usize) -> Self {
        let header = graph
            .get(root)
            .map(|n| n.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("Scene")
            .to_string();

        let mut rows = Vec::new();
        let mut omitted = 0;
        let mut stack: Vec<(NodeId, usize)> = graph
            .get(root)
            .map(|n| n.children().iter().rev().map(|c| (*c, 0)).collect())
            .unwrap_or_default();

        while let Some((id, depth)) = stack.pop() {
            let Some(node) = graph.get(id) else {
                continue;
            };
            stack.extend(node.children().iter().rev().map(|c| (*c, depth + 1)));

            let listed = node.is_mesh() || (!node.children().is_empty() && !node.name.is_empty());
            if !listed {
                continue;
            }
            if rows.len() >= max_items {
                omitted += 1;
                continue;
            }
            let label = if !node.name.trim().is_empty() {
                node.name.clone()
            } else if node.is_mesh() {
                "(mesh)".to_string()
            } else {
                "(group)".to_string()
            };
            rows.push(BrowserRow {
                node: id,
                label,
                depth,
                is_mesh: node.is_mesh(),
                visible: node.visible,
            });
        }

        Self {
            header,
            rows,
            omitted,
            max_items,
        }
    }

    pub fn truncation_note(&self) -> Option<String> {
        (self.omitted > 0)
            .then(|| format!("Showing first {} nodes (model is large).", self.max_items))
    }
}
