use crate::render::camera::{ButtonMap, MouseAction, OrbitController};

/// Exclusive pointer interaction mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum InteractionMode {
    #[default]
    Orbit,
    Pan,
    Zoom,
}

impl InteractionMode {
    pub const ALL: [InteractionMode; 3] = [Self::Orbit, Self::Pan, Self::Zoom];

    pub fn label(self) -> &'static str {
        match self {
            Self::Orbit => "Orbit",
            Self::Pan => "Pan",
            Self::Zoom => "Zoom",
        }
    }

    /// Rewire the controller's axis flags and button bindings for this mode.
    pub fn apply(self, controls: &mut OrbitController) {
        let (rotate, pan, zoom, buttons) = match self {
            Self::Orbit => (true, true, true, ButtonMap::default()),
            Self::Pan => (false, true, false, ButtonMap::uniform(MouseAction::Pan)),
            Self::Zoom => (false, false, true, ButtonMap::uniform(MouseAction::Dolly)),
        };
        controls.enable_rotate = rotate;
        controls.enable_pan = pan;
        controls.enable_zoom = zoom;
        controls.buttons = buttons;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::camera::{PerspectiveCamera, PointerButton};

    const BUTTONS: [PointerButton; 3] = [PointerButton::Left, PointerButton::Middle, PointerButton::Right];

    fn controls() -> OrbitController {
        OrbitController::new(&PerspectiveCamera::new(60.0, 1.0, 0.1, 100.0))
    }

    #[test]
    fn orbit_maps_rotate_dolly_pan() {
        let mut controls = controls();
        InteractionMode::Zoom.apply(&mut controls);
        InteractionMode::Orbit.apply(&mut controls);
        let actions: Vec<_> = BUTTONS.iter().map(|b| controls.action_for(*b)).collect();
        assert_eq!(
            actions,
            [Some(MouseAction::Rotate), Some(MouseAction::Dolly), Some(MouseAction::Pan)]
        );
    }

    #[test]
    fn pan_binds_every_button_to_pan() {
        let mut controls = controls();
        InteractionMode::Pan.apply(&mut controls);
        assert!(!controls.enable_rotate && controls.enable_pan && !controls.enable_zoom);
        for button in BUTTONS {
            assert_eq!(controls.action_for(button), Some(MouseAction::Pan));
        }
        assert!(!controls.wheel(-1.0));
    }

    #[test]
    fn zoom_binds_only_dolly() {
        let mut controls = controls();
        InteractionMode::Zoom.apply(&mut controls);
        assert!(!controls.enable_rotate && !controls.enable_pan && controls.enable_zoom);
        for button in BUTTONS {
            assert_eq!(controls.action_for(button), Some(MouseAction::Dolly));
        }
    }
}
