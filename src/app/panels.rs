//! egui panels backing the viewer's UI ports.
//!
//! The viewer pushes into a shared [`PanelState`]; the frame code reads it
//! back when drawing. Clicks are collected as [`UiAction`]s and applied after
//! drawing, so no borrow of the state is held while the viewer calls a port.

use archviz::scene::floors::{FloorRecord, FloorStatus};
use archviz::scene::NodeId;
use archviz::ui::{
    BrowserList, LoaderSink, MetadataPanel, ModeSelector, ModelBrowser, PanelToggle, StatusTable,
    ViewerPorts,
};
use archviz::viewer::InteractionMode;
use std::cell::{Ref, RefCell};
use std::rc::Rc;

#[derive(Default)]
pub struct PanelState {
    pub loader: Option<String>,
    pub records: Vec<FloorRecord>,
    pub highlighted: Option<String>,
    pub selection: Option<FloorRecord>,
    pub mode: InteractionMode,
    pub browser_open: bool,
    pub browser: Option<BrowserList>,
}

#[derive(Clone, Default)]
pub struct Panels(Rc<RefCell<PanelState>>);

impl Panels {
    pub fn ports(&self) -> ViewerPorts {
        ViewerPorts {
            loader: Some(Box::new(self.clone())),
            status_table: Some(Box::new(self.clone())),
            metadata: Some(Box::new(self.clone())),
            mode_selector: Some(Box::new(self.clone())),
            panel_toggle: Some(Box::new(self.clone())),
            browser: Some(Box::new(self.clone())),
        }
    }

    pub fn state(&self) -> Ref<'_, PanelState> {
        self.0.borrow()
    }

    pub fn set_loader(&self, text: Option<&str>) {
        self.0.borrow_mut().loader = text.map(str::to_string);
    }
}

impl LoaderSink for Panels {
    fn show(&mut self, text: &str) {
        self.set_loader(Some(text));
    }

    fn hide(&mut self) {
        self.set_loader(None);
    }
}

impl StatusTable for Panels {
    fn render(&mut self, records: &[FloorRecord], highlighted: Option<&str>) {
        let mut state = self.0.borrow_mut();
        state.records = records.to_vec();
        state.highlighted = highlighted.map(str::to_string);
    }
}

impl MetadataPanel for Panels {
    fn show_record(&mut self, record: Option<&FloorRecord>) {
        self.0.borrow_mut().selection = record.cloned();
    }
}

impl ModeSelector for Panels {
    fn select(&mut self, mode: InteractionMode) {
        self.0.borrow_mut().mode = mode;
    }
}

impl PanelToggle for Panels {
    fn toggle(&mut self) -> bool {
        let mut state = self.0.borrow_mut();
        state.browser_open = !state.browser_open;
        state.browser_open
    }
}

impl ModelBrowser for Panels {
    fn render(&mut self, list: &BrowserList) {
        self.0.borrow_mut().browser = Some(list.clone());
    }

    fn clear(&mut self) {
        self.0.borrow_mut().browser = None;
    }
}

// ========================================================================
// Drawing
// ========================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiAction {
    OpenModel,
    ResetView,
    SetMode(InteractionMode),
    Screenshot,
    ToggleBrowser,
    ToggleVisibility(NodeId),
    Focus(NodeId),
}

pub fn status_color(status: FloorStatus) -> egui::Color32 {
    match status {
        FloorStatus::Free => egui::Color32::from_rgb(0x2e, 0xcc, 0x71),
        FloorStatus::Reserved => egui::Color32::from_rgb(0xf1, 0xc4, 0x0f),
        FloorStatus::Sold => egui::Color32::from_rgb(0xe7, 0x4c, 0x3c),
    }
}

pub fn toolbar(ui: &mut egui::Ui, state: &PanelState, actions: &mut Vec<UiAction>) {
    ui.horizontal(|ui| {
        if ui.button("Open model...").clicked() {
            actions.push(UiAction::OpenModel);
        }
        if ui.button("Reset view").clicked() {
            actions.push(UiAction::ResetView);
        }
        ui.separator();
        for mode in InteractionMode::ALL {
            if ui.selectable_label(state.mode == mode, mode.label()).clicked() {
                actions.push(UiAction::SetMode(mode));
            }
        }
        ui.separator();
        if ui.button("Screenshot").clicked() {
            actions.push(UiAction::Screenshot);
        }
        if ui.selectable_label(state.browser_open, "Model browser").clicked() {
            actions.push(UiAction::ToggleBrowser);
        }
    });
}

pub fn floor_panel(ui: &mut egui::Ui, state: &PanelState) {
    ui.heading("Floors");
    egui::Grid::new("floor_table")
        .striped(true)
        .num_columns(4)
        .show(ui, |ui| {
            ui.strong("Floor");
            ui.strong("Size");
            ui.strong("Price");
            ui.strong("Status");
            ui.end_row();
            for record in &state.records {
                let label = if state.highlighted.as_deref() == Some(record.key.as_str()) {
                    egui::RichText::new(&record.floor_label).strong().underline()
                } else {
                    egui::RichText::new(&record.floor_label)
                };
                ui.label(label);
                ui.label(format!("{:.1} m²", record.size));
                ui.label(format!("{:.0} €", record.price));
                ui.colored_label(status_color(record.status), record.status.label());
                ui.end_row();
            }
        });

    ui.separator();
    match &state.selection {
        Some(record) => {
            ui.heading(&record.display_name);
            ui.label(format!("Floor: {}", record.floor_label));
            ui.label(format!("Size: {:.1} m²", record.size));
            ui.label(format!("Price: {:.0} €", record.price));
            ui.colored_label(status_color(record.status), record.status.label());
        }
        None => {
            ui.weak("Hover a floor to see its details.");
        }
    }
}

pub fn browser_panel(ui: &mut egui::Ui, state: &PanelState, actions: &mut Vec<UiAction>) {
    let Some(list) = &state.browser else {
        ui.weak("No model loaded.");
        return;
    };
    ui.heading(&list.header);
    egui::ScrollArea::vertical().show(ui, |ui| {
        for row in &list.rows {
            ui.horizontal(|ui| {
                ui.add_space(row.depth as f32 * 12.0);
                let mut visible = row.visible;
                if ui.checkbox(&mut visible, "").changed() {
                    actions.push(UiAction::ToggleVisibility(row.node));
                }
                let text = if row.is_mesh {
                    egui::RichText::new(&row.label)
                } else {
                    egui::RichText::new(&row.label).strong()
                };
                if ui.button(text).clicked() {
                    actions.push(UiAction::Focus(row.node));
                }
            });
        }
        if let Some(note) = list.truncation_note() {
            ui.weak(note);
        }
    });
}
