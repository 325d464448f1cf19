//! Panel resize math.

use crate::types::OverlayConfig;

/// Width for a panel docked to the right edge after the pointer moved from
/// `start_x` to `current_x`. Moving left widens the panel.
///
/// The upper bound wins when the viewport is too narrow for both bounds.
pub fn panel_width(start_width: u32, start_x: f64, current_x: f64, viewport_width: f64, config: &OverlayConfig) -> u32 {
    let delta = start_x - current_x;
    let max_width = viewport_width * config.max_width_ratio;
    let width = (f64::from(start_width) + delta)
        .max(f64::from(config.min_width))
        .min(max_width);
    width.round().max(0.0) as u32
}

/// An in-progress resizer drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub start_x: f64,
    pub start_width: u32,
}

impl DragSession {
    pub fn new(start_x: f64, start_width: u32) -> Self {
        Self { start_x, start_width }
    }

    pub fn width_at(&self, current_x: f64, viewport_width: f64, config: &OverlayConfig) -> u32 {
        panel_width(self.start_width, self.start_x, current_x, viewport_width, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_right_shrinks() {
        let drag = DragSession::new(1000.0, 450);
        assert_eq!(drag.width_at(1100.0, 1600.0, &OverlayConfig::default()), 350);
    }

    #[test]
    fn test_drag_left_grows_until_ratio() {
        let config = OverlayConfig::default();
        let drag = DragSession::new(1000.0, 450);
        assert_eq!(drag.width_at(900.0, 1600.0, &config), 550);
        assert_eq!(drag.width_at(0.0, 1600.0, &config), 1280);
    }

    #[test]
    fn test_min_width_floor() {
        let drag = DragSession::new(1000.0, 450);
        assert_eq!(drag.width_at(1500.0, 1600.0, &OverlayConfig::default()), 200);
    }

    #[test]
    fn test_fractional_pointer_rounds() {
        let drag = DragSession::new(1000.0, 450);
        assert_eq!(drag.width_at(999.4, 1600.0, &OverlayConfig::default()), 451);
    }

    #[test]
    fn test_narrow_viewport_caps_below_min() {
        let drag = DragSession::new(100.0, 450);
        assert_eq!(drag.width_at(100.0, 200.0, &OverlayConfig::default()), 160);
    }
}
