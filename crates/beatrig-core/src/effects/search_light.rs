use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::time::{Duration, Instant};

use crate::group::SharedGroup;

const DEFAULT_CYCLE_TIME: u64 = 10_000;

fn default_radius() -> f64 {
    1.0
}

fn default_center() -> f64 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchLightProps {
    /// Milliseconds for one full sweep
    #[serde(default)]
    pub cycle_time: Option<u64>,
    /// Size of the sweep, 0..=1 of the full pan/tilt range
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default = "default_center")]
    pub pan_center: f64,
    #[serde(default = "default_center")]
    pub tilt_center: f64,
    /// Value for the moving-speed channel, where present
    #[serde(default)]
    pub moving_speed: Option<u8>,
}

impl Default for SearchLightProps {
    fn default() -> Self {
        Self {
            cycle_time: None,
            radius: default_radius(),
            pan_center: default_center(),
            tilt_center: default_center(),
            moving_speed: None,
        }
    }
}

/// Moving heads sweep an ellipse, spread over the group's width
#[derive(Debug)]
pub struct SearchLight {
    pub(super) group: SharedGroup,
    props: SearchLightProps,
    start: Option<Instant>,
}

impl SearchLight {
    pub const NAME: &'static str = "SearchLight";

    pub fn new(group: SharedGroup, props: SearchLightProps) -> Self {
        Self {
            group,
            props,
            start: None,
        }
    }

    pub(super) fn tick_at(&mut self, now: Instant) {
        let cycle_time = Duration::from_millis(self.props.cycle_time.unwrap_or(DEFAULT_CYCLE_TIME))
            .max(Duration::from_millis(1));
        let start = *self.start.get_or_insert(now);
        let phase = (now.saturating_duration_since(start).as_secs_f64() / cycle_time.as_secs_f64())
            .fract();

        let radius = self.props.radius.clamp(0.0, 1.0);
        let mut group = self.group.lock();
        let grid_width = group.grid_size_x;
        let heads = group.moving_head_rgbs.len() + group.moving_head_wheels.len();

        for (i, p) in group.moving_heads_mut().enumerate() {
            // Spread fixtures over the sweep by position, or by order without a grid
            let offset = if grid_width > 0.0 {
                p.position_x / grid_width
            } else {
                i as f64 / heads as f64
            };
            let angle = TAU * (phase + offset);
            let pan = self.props.pan_center + radius * 0.5 * angle.cos();
            let tilt = self.props.tilt_center + radius * 0.25 * angle.sin();

            p.fixture.set_movement(to_position(pan), to_position(tilt));
            if let Some(speed) = self.props.moving_speed {
                p.fixture.set_moving_speed(speed);
            }
        }
    }

    pub(super) fn destroy(&mut self) {
        self.start = None;
    }
}

fn to_position(value: f64) -> u16 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * u16::MAX as f64).round() as u16
}
