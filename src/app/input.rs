use archviz::render::camera::PointerButton;
use glam::Vec2;

/// Host pointer state for the viewport area.
#[derive(Default, Debug, Clone, Copy)]
pub struct InputState {
    pub hovering: bool,
}

impl InputState {
    /// Whether a pointer-leave has to be forwarded now that the viewport's
    /// hover state is `hovering`.
    pub fn handle_hover(&mut self, hovering: bool) -> bool {
        let left = self.hovering && !hovering;
        self.hovering = hovering;
        left
    }
}

pub fn map_button(button: egui::PointerButton) -> Option<PointerButton> {
    match button {
        egui::PointerButton::Primary => Some(PointerButton::Left),
        egui::PointerButton::Middle => Some(PointerButton::Middle),
        egui::PointerButton::Secondary => Some(PointerButton::Right),
        _ => None,
    }
}

/// Drags of the current frame as (button, delta) pairs.
pub fn drags(response: &egui::Response) -> Vec<(PointerButton, Vec2)> {
    let delta = response.drag_delta();
    if delta == egui::Vec2::ZERO {
        return Vec::new();
    }
    [
        egui::PointerButton::Primary,
        egui::PointerButton::Middle,
        egui::PointerButton::Secondary,
    ]
    .into_iter()
    .filter(|button| response.dragged_by(*button))
    .filter_map(map_button)
    .map(|button| (button, Vec2::new(delta.x, delta.y)))
    .collect()
}
