//! Transient pointer state and the gesture handlers that turn pointer events
//! into stroke actions.
//!
//! Nothing here is persisted: it only makes sense for the live session.
//! Each handler applies the action it produces to the store and returns it,
//! so callers can log or record the gesture.

use crate::state::{Action, RegionalPromptsState, reduce};

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointerState {
    pub is_mouse_down: bool,
    pub is_mouse_over: bool,
    pub cursor_position: Option<Vector2>,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Primary button pressed on the surface: start a new line on the
    /// selected layer.
    pub fn on_mouse_down(&mut self, state: &mut RegionalPromptsState, pos: Vector2) -> Option<Action> {
        self.cursor_position = Some(pos);
        if state.selected().is_none() {
            return None;
        }
        self.is_mouse_down = true;
        Some(dispatch(state, Action::line_added(vec![pos.x, pos.y])))
    }

    /// Pointer moved: track the cursor and extend the active line while
    /// the button is held.
    pub fn on_mouse_move(&mut self, state: &mut RegionalPromptsState, pos: Vector2) -> Option<Action> {
        self.cursor_position = Some(pos);
        if !self.is_mouse_down || state.selected().is_none() {
            return None;
        }
        Some(dispatch(state, Action::PointsAdded(vec![pos.x, pos.y])))
    }

    pub fn on_mouse_up(&mut self) {
        self.is_mouse_down = false;
    }

    /// Pointer entered the surface. A drag that re-enters with the primary
    /// button held starts a fresh line at the entry point.
    pub fn on_mouse_enter(
        &mut self,
        state: &mut RegionalPromptsState,
        pos: Vector2,
        primary_button_down: bool,
    ) -> Option<Action> {
        self.is_mouse_over = true;
        self.cursor_position = Some(pos);
        if !primary_button_down || state.selected().is_none() {
            return None;
        }
        self.is_mouse_down = true;
        Some(dispatch(state, Action::line_added(vec![pos.x, pos.y])))
    }

    pub fn on_mouse_leave(&mut self) {
        self.is_mouse_over = false;
        self.is_mouse_down = false;
        self.cursor_position = None;
    }
}

fn dispatch(state: &mut RegionalPromptsState, action: Action) -> Action {
    log::trace!("pointer dispatch: {}", action.name());
    reduce(state, action.clone());
    action
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DrawObject, LayerKind};

    fn state_with_layer() -> RegionalPromptsState {
        let mut state = RegionalPromptsState::new();
        reduce(&mut state, Action::layer_added(LayerKind::PromptRegionLayer));
        state
    }

    fn line_points(state: &RegionalPromptsState) -> Vec<Vec<f32>> {
        state.layers[0]
            .objects()
            .iter()
            .filter_map(|o| match o {
                DrawObject::Line(l) => Some(l.points.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn drag_accumulates_one_line() {
        let mut state = state_with_layer();
        let mut pointer = PointerState::new();

        assert!(matches!(
            pointer.on_mouse_down(&mut state, Vector2::new(1.0, 2.0)),
            Some(Action::LineAdded { .. })
        ));
        pointer.on_mouse_move(&mut state, Vector2::new(3.0, 4.0));
        pointer.on_mouse_move(&mut state, Vector2::new(5.0, 6.0));
        pointer.on_mouse_up();
        assert!(pointer.on_mouse_move(&mut state, Vector2::new(7.0, 8.0)).is_none());

        assert_eq!(line_points(&state), vec![vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]]);
        assert_eq!(pointer.cursor_position, Some(Vector2::new(7.0, 8.0)));
    }

    #[test]
    fn mouse_down_without_selection_does_nothing() {
        let mut state = RegionalPromptsState::new();
        let mut pointer = PointerState::new();
        assert!(pointer.on_mouse_down(&mut state, Vector2::new(1.0, 1.0)).is_none());
        assert!(!pointer.is_mouse_down);
    }

    #[test]
    fn leave_clears_transient_state() {
        let mut state = state_with_layer();
        let mut pointer = PointerState::new();
        pointer.on_mouse_enter(&mut state, Vector2::new(0.0, 0.0), false);
        pointer.on_mouse_down(&mut state, Vector2::new(1.0, 1.0));
        pointer.on_mouse_leave();
        assert_eq!(pointer, PointerState::default());
    }

    #[test]
    fn entering_with_button_held_starts_a_new_line() {
        let mut state = state_with_layer();
        let mut pointer = PointerState::new();
        pointer.on_mouse_down(&mut state, Vector2::new(1.0, 1.0));
        pointer.on_mouse_leave();
        pointer.on_mouse_enter(&mut state, Vector2::new(9.0, 9.0), true);
        pointer.on_mouse_move(&mut state, Vector2::new(10.0, 10.0));
        assert!(pointer.is_mouse_over);
        assert_eq!(
            line_points(&state),
            vec![vec![1.0, 1.0], vec![9.0, 9.0, 10.0, 10.0]]
        );
    }

    #[test]
    fn dangling_selection_starts_no_line() {
        let mut state = state_with_layer();
        reduce(&mut state, Action::LayerSelected(crate::state::LayerId::new()));
        let mut pointer = PointerState::new();

        assert!(pointer.on_mouse_down(&mut state, Vector2::new(1.0, 1.0)).is_none());
        assert!(!pointer.is_mouse_down);
        assert!(pointer.on_mouse_enter(&mut state, Vector2::new(2.0, 2.0), true).is_none());
        assert!(!pointer.is_mouse_down);
        assert!(state.layers[0].objects().is_empty());
    }
}
