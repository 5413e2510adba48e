use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::time::{Duration, Instant};

use super::brightness;
use crate::color::RgbColor;
use crate::group::{GroupFixture, SharedGroup};

const DEFAULT_CYCLE_TIME: u64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveProps {
    pub color: RgbColor,
    /// Milliseconds for the wave to travel across the whole group once
    #[serde(default)]
    pub cycle_time: Option<u64>,
}

/// A sine wave of brightness moving along the fixtures.
///
/// Fixtures are ordered by descending DMX address, so on a rig wired left to
/// right the wave travels right to left.
#[derive(Debug)]
pub struct Wave {
    pub(super) group: SharedGroup,
    props: WaveProps,
    cycle_start: Option<Instant>,
}

impl Wave {
    pub const NAME: &'static str = "Wave";

    pub fn new(group: SharedGroup, props: WaveProps) -> Self {
        Self {
            group,
            props,
            cycle_start: None,
        }
    }

    fn progression(&mut self, now: Instant) -> f64 {
        let cycle_time = Duration::from_millis(self.props.cycle_time.unwrap_or(DEFAULT_CYCLE_TIME))
            .max(Duration::from_millis(1));
        let start = *self.cycle_start.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start);

        let progression = (elapsed.as_secs_f64() / cycle_time.as_secs_f64()).min(1.0);
        if progression >= 1.0 {
            self.cycle_start = Some(now);
            return 0.0;
        }
        progression
    }

    pub(super) fn tick_at(&mut self, now: Instant) {
        let progression = self.progression(now);
        let color = self.props.color;

        let mut group = self.group.lock();
        let mut fixtures: Vec<&mut GroupFixture> = group.fixtures_mut().collect();
        fixtures.sort_by(|a, b| b.first_channel.cmp(&a.first_channel));

        let count = fixtures.len() as f64;
        for (i, p) in fixtures.into_iter().enumerate() {
            let phase = i as f64 / count + progression;
            p.fixture.set_color(color);
            p.fixture
                .set_master_dimmer(brightness((TAU * phase).sin().max(0.0)));
        }
    }

    pub(super) fn destroy(&mut self) {
        self.cycle_start = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{ColorChannels, Fixture, FixtureLayout};
    use crate::group::LightsGroup;

    fn group(addresses: &[u16]) -> SharedGroup {
        let mut group = LightsGroup::new(1, "Wave", 1);
        group.pars = addresses
            .iter()
            .enumerate()
            .map(|(i, first_channel)| GroupFixture {
                id: i as u32,
                first_channel: *first_channel,
                position_x: i as f64,
                position_y: 0.0,
                fixture: Fixture::new(
                    "par",
                    1,
                    2,
                    FixtureLayout::Par {
                        color: ColorChannels::rgb(3, 4, 5),
                    },
                )
                .unwrap(),
            })
            .collect();
        group.into_shared()
    }

    fn dimmers(group: &SharedGroup) -> Vec<(u16, u8)> {
        group
            .lock()
            .fixtures()
            .map(|p| (p.first_channel, p.fixture.state().master_dim))
            .collect()
    }

    #[test]
    fn test_first_frame_phases() {
        // Four fixtures: the highest address gets phase 0, the next 0.25...
        let shared = group(&[1, 17, 33, 49]);
        let mut wave = Wave::new(
            shared.clone(),
            WaveProps {
                color: RgbColor::Blue,
                cycle_time: Some(1000),
            },
        );
        wave.tick_at(Instant::now());

        let by_address = dimmers(&shared);
        assert_eq!(by_address, vec![(1, 0), (17, 0), (33, 255), (49, 0)]);
    }

    #[test]
    fn test_wave_moves_with_time() {
        let shared = group(&[1, 17, 33, 49]);
        let mut wave = Wave::new(
            shared.clone(),
            WaveProps {
                color: RgbColor::Blue,
                cycle_time: Some(1000),
            },
        );
        let start = Instant::now();
        wave.tick_at(start);
        wave.tick_at(start + Duration::from_millis(250));

        // Everything shifted by a quarter cycle
        let by_address = dimmers(&shared);
        assert_eq!(by_address, vec![(1, 0), (17, 0), (33, 0), (49, 255)]);
    }

    #[test]
    fn test_cycle_wraps() {
        let shared = group(&[1]);
        let mut wave = Wave::new(
            shared.clone(),
            WaveProps {
                color: RgbColor::Red,
                cycle_time: Some(1000),
            },
        );
        let start = Instant::now();
        wave.tick_at(start);
        assert_eq!(wave.progression(start + Duration::from_millis(1500)), 0.0);
        assert_eq!(wave.cycle_start, Some(start + Duration::from_millis(1500)));
    }

    #[test]
    fn test_empty_group_is_fine() {
        let shared = LightsGroup::new(1, "Empty", 1).into_shared();
        let mut wave = Wave::new(
            shared,
            WaveProps {
                color: RgbColor::Red,
                cycle_time: None,
            },
        );
        wave.tick_at(Instant::now());
    }
}
