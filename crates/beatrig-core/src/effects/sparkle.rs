use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::{brightness, decay};
use crate::color::RgbColor;
use crate::error::{CoreError, Result};
use crate::group::SharedGroup;

const DEFAULT_RATIO: f64 = 0.2;
const DEFAULT_DIM_DURATION: u64 = 800;
const DEFAULT_CYCLE_TIME: u64 = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparkleProps {
    pub colors: Vec<RgbColor>,
    /// Chance (0..=1) that a fixture lights up each cycle
    #[serde(default)]
    pub ratio: Option<f64>,
    /// Milliseconds a fixture takes to dim back to zero
    #[serde(default)]
    pub dim_duration: Option<u64>,
    /// Milliseconds between two rounds of lighting up fixtures
    #[serde(default)]
    pub cycle_time: Option<u64>,
}

/// Fixtures light up at random and dim linearly
#[derive(Debug)]
pub struct Sparkle {
    pub(super) group: SharedGroup,
    props: SparkleProps,
    last_hits: Vec<Option<Instant>>,
    color_indices: Vec<usize>,
    previous_cycle: Option<Instant>,
}

impl Sparkle {
    pub const NAME: &'static str = "Sparkle";

    pub fn new(group: SharedGroup, props: SparkleProps) -> Result<Self> {
        if props.colors.is_empty() {
            return Err(CoreError::EmptyPalette { effect: Self::NAME });
        }
        if let Some(ratio) = props.ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(CoreError::InvalidEffectProps {
                    effect: Self::NAME.to_string(),
                    reason: format!("ratio {} is outside 0..=1", ratio),
                });
            }
        }

        let fixtures = group.lock().fixture_count();
        Ok(Self {
            group,
            props,
            last_hits: vec![None; fixtures],
            color_indices: vec![0; fixtures],
            previous_cycle: None,
        })
    }

    fn start_cycle(&mut self, now: Instant) {
        let ratio = self.props.ratio.unwrap_or(DEFAULT_RATIO);
        let colors = self.props.colors.len();
        let mut rng = rand::rng();

        for (hit, index) in self.last_hits.iter_mut().zip(self.color_indices.iter_mut()) {
            if rng.random_bool(ratio) {
                *index = (*index + 1) % colors;
                *hit = Some(now);
            }
        }
        self.previous_cycle = Some(now);
    }

    pub(super) fn tick_at(&mut self, now: Instant) {
        let cycle_time =
            Duration::from_millis(self.props.cycle_time.unwrap_or(DEFAULT_CYCLE_TIME));
        let due = self
            .previous_cycle
            .map_or(true, |p| now.saturating_duration_since(p) >= cycle_time);
        if due {
            self.start_cycle(now);
        }

        let dim_duration =
            Duration::from_millis(self.props.dim_duration.unwrap_or(DEFAULT_DIM_DURATION));
        let colors = &self.props.colors;

        let mut group = self.group.lock();
        for (i, p) in group.fixtures_mut().enumerate() {
            let progression = self
                .last_hits
                .get(i)
                .copied()
                .flatten()
                .map_or(0.0, |hit| decay(hit, now, dim_duration));
            let index = self.color_indices.get(i).copied().unwrap_or(0);

            p.fixture.set_color(colors[index % colors.len()]);
            p.fixture.set_master_dimmer(brightness(progression));
        }
    }

    pub(super) fn destroy(&mut self) {
        self.last_hits.clear();
        self.color_indices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{ColorChannels, Fixture, FixtureLayout};
    use crate::group::{GroupFixture, LightsGroup};

    fn group(fixtures: u16) -> SharedGroup {
        let mut group = LightsGroup::new(1, "Sparkles", 1);
        group.pars = (0..fixtures)
            .map(|i| GroupFixture {
                id: i as u32,
                first_channel: 1 + i * 16,
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

    fn props(ratio: f64) -> SparkleProps {
        SparkleProps {
            colors: vec![RgbColor::Red, RgbColor::Blue],
            ratio: Some(ratio),
            dim_duration: Some(800),
            cycle_time: Some(200),
        }
    }

    #[test]
    fn test_empty_palette_rejected() {
        let result = Sparkle::new(
            group(1),
            SparkleProps {
                colors: vec![],
                ratio: None,
                dim_duration: None,
                cycle_time: None,
            },
        );
        assert!(matches!(result, Err(CoreError::EmptyPalette { .. })));
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        assert!(Sparkle::new(group(1), props(1.5)).is_err());
    }

    #[test]
    fn test_full_ratio_hits_everything_then_dims() {
        let shared = group(3);
        let mut sparkle = Sparkle::new(shared.clone(), props(1.0)).unwrap();
        let start = Instant::now();

        sparkle.tick_at(start);
        {
            let g = shared.lock();
            for p in g.fixtures() {
                assert_eq!(p.fixture.state().master_dim, 255);
                // Index advanced from 0 to 1
                assert_eq!(p.fixture.state().color, RgbColor::Blue.spec());
            }
        }

        // Half way through the dim window, before the next cycle
        sparkle.tick_at(start + Duration::from_millis(100));
        let g = shared.lock();
        for p in g.fixtures() {
            let dim = p.fixture.state().master_dim;
            assert!(dim > 200 && dim < 255, "dim = {}", dim);
        }
    }

    #[test]
    fn test_zero_ratio_stays_dark() {
        let shared = group(4);
        let mut sparkle = Sparkle::new(shared.clone(), props(0.0)).unwrap();
        let start = Instant::now();
        for step in 0..10 {
            sparkle.tick_at(start + Duration::from_millis(step * 250));
        }
        assert!(shared
            .lock()
            .fixtures()
            .all(|p| p.fixture.state().master_dim == 0));
    }

    #[test]
    fn test_fully_decayed_after_dim_duration() {
        let shared = group(2);
        let mut sparkle = Sparkle::new(
            shared.clone(),
            SparkleProps {
                cycle_time: Some(10_000),
                ..props(1.0)
            },
        )
        .unwrap();
        let start = Instant::now();
        sparkle.tick_at(start);
        sparkle.tick_at(start + Duration::from_millis(900));
        assert!(shared
            .lock()
            .fixtures()
            .all(|p| p.fixture.state().master_dim == 0));
    }
}
