//! DMX fixtures and their channel layouts
//!
//! Channel numbers inside a [`Fixture`] are relative to the fixture itself and
//! 1-based: channel 1 is the fixture's first DMX address. Every fixture fits in
//! a 16-channel window, which is what [`Fixture::to_dmx`] produces.
//!
//! Effects only ever touch the fixture's [`FixtureState`]. Each setter stamps
//! the fixture with a monotonic timestamp when the rendered state actually
//! changes, so the compositor can skip re-encoding untouched fixtures.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::color::{ColorSpec, RgbColor, WheelColor};
use crate::error::{CoreError, Result};

/// Number of channels reserved for every fixture
pub const FIXTURE_WINDOW: usize = 16;

/// Named states of the shutter channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutterOption {
    #[default]
    Open,
    Strobe,
}

/// Direct color-mixing channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorChannels {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    #[serde(default)]
    pub cold_white: Option<u16>,
    #[serde(default)]
    pub warm_white: Option<u16>,
    #[serde(default)]
    pub amber: Option<u16>,
    #[serde(default)]
    pub uv: Option<u16>,
}

impl ColorChannels {
    pub fn rgb(red: u16, green: u16, blue: u16) -> Self {
        Self {
            red,
            green,
            blue,
            cold_white: None,
            warm_white: None,
            amber: None,
            uv: None,
        }
    }

    /// Drop the components this fixture cannot render
    fn mask(&self, spec: ColorSpec) -> ColorSpec {
        ColorSpec {
            cold_white: self.cold_white.map_or(0, |_| spec.cold_white),
            warm_white: self.warm_white.map_or(0, |_| spec.warm_white),
            amber: self.amber.map_or(0, |_| spec.amber),
            uv: self.uv.map_or(0, |_| spec.uv),
            ..spec
        }
    }

    fn channels(&self) -> impl Iterator<Item = u16> + '_ {
        [self.red, self.green, self.blue]
            .into_iter()
            .chain(self.cold_white)
            .chain(self.warm_white)
            .chain(self.amber)
            .chain(self.uv)
    }
}

/// Pan/tilt channels of a moving head
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementChannels {
    pub pan: u16,
    #[serde(default)]
    pub fine_pan: Option<u16>,
    pub tilt: u16,
    #[serde(default)]
    pub fine_tilt: Option<u16>,
    #[serde(default)]
    pub moving_speed: Option<u16>,
}

impl MovementChannels {
    fn channels(&self) -> impl Iterator<Item = u16> + '_ {
        [self.pan, self.tilt]
            .into_iter()
            .chain(self.fine_pan)
            .chain(self.fine_tilt)
            .chain(self.moving_speed)
    }
}

/// A raw channel value with a name, e.g. one slot on a gobo wheel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValue<T> {
    pub name: T,
    pub value: u8,
}

/// Discrete wheel channels of a wheel-based moving head
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelChannels {
    pub color_wheel: u16,
    #[serde(default)]
    pub color_wheel_values: Vec<NamedValue<WheelColor>>,
    pub gobo_wheel: u16,
    #[serde(default)]
    pub gobo_wheel_values: Vec<NamedValue<String>>,
    #[serde(default)]
    pub gobo_rotate: Option<u16>,
    #[serde(default)]
    pub gobo_rotate_values: Vec<NamedValue<String>>,
}

impl WheelChannels {
    fn channels(&self) -> impl Iterator<Item = u16> + '_ {
        [self.color_wheel, self.gobo_wheel]
            .into_iter()
            .chain(self.gobo_rotate)
    }
}

/// Kind-specific part of a fixture's channel layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FixtureLayout {
    Par {
        color: ColorChannels,
    },
    MovingHeadRgb {
        color: ColorChannels,
        movement: MovementChannels,
    },
    MovingHeadWheel {
        wheel: WheelChannels,
        movement: MovementChannels,
    },
}

impl FixtureLayout {
    pub fn color(&self) -> Option<&ColorChannels> {
        match self {
            FixtureLayout::Par { color } | FixtureLayout::MovingHeadRgb { color, .. } => {
                Some(color)
            }
            FixtureLayout::MovingHeadWheel { .. } => None,
        }
    }

    pub fn movement(&self) -> Option<&MovementChannels> {
        match self {
            FixtureLayout::Par { .. } => None,
            FixtureLayout::MovingHeadRgb { movement, .. }
            | FixtureLayout::MovingHeadWheel { movement, .. } => Some(movement),
        }
    }

    pub fn wheel(&self) -> Option<&WheelChannels> {
        match self {
            FixtureLayout::MovingHeadWheel { wheel, .. } => Some(wheel),
            _ => None,
        }
    }
}

/// Reset function of a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetChannel {
    pub channel: u16,
    pub value: u8,
}

/// What a fixture is currently rendering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixtureState {
    pub master_dim: u8,
    pub shutter: ShutterOption,
    /// Color-mixing values; all zero on wheel fixtures
    pub color: ColorSpec,
    /// Selected wheel slot; always `None` on color-mixing fixtures
    pub wheel_color: Option<WheelColor>,
    pub gobo: Option<String>,
    pub gobo_rotate: Option<String>,
    /// 16-bit pan position (coarse byte is the high byte)
    pub pan: u16,
    /// 16-bit tilt position (coarse byte is the high byte)
    pub tilt: u16,
    pub moving_speed: u8,
    pub reset: bool,
}

/// A physical light
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub name: String,
    pub master_dim_channel: u16,
    pub shutter_channel: u16,
    #[serde(default)]
    pub shutter_options: BTreeMap<ShutterOption, u8>,
    #[serde(default)]
    pub reset: Option<ResetChannel>,
    pub layout: FixtureLayout,
    #[serde(skip)]
    state: FixtureState,
    #[serde(skip)]
    updated_at: Option<Instant>,
}

impl Fixture {
    /// Create a fixture, validating that every channel lies in 1..=16
    pub fn new(
        name: impl Into<String>,
        master_dim_channel: u16,
        shutter_channel: u16,
        layout: FixtureLayout,
    ) -> Result<Self> {
        let fixture = Self {
            name: name.into(),
            master_dim_channel,
            shutter_channel,
            shutter_options: BTreeMap::new(),
            reset: None,
            layout,
            state: FixtureState::default(),
            updated_at: None,
        };
        fixture.validate()?;
        Ok(fixture)
    }

    pub fn with_shutter_option(mut self, option: ShutterOption, value: u8) -> Self {
        self.shutter_options.insert(option, value);
        self
    }

    pub fn with_reset(mut self, channel: u16, value: u8) -> Result<Self> {
        self.reset = Some(ResetChannel { channel, value });
        self.validate()?;
        Ok(self)
    }

    /// Check that all channels fit in the fixture window
    pub fn validate(&self) -> Result<()> {
        let layout_channels: Vec<u16> = match &self.layout {
            FixtureLayout::Par { color } => color.channels().collect(),
            FixtureLayout::MovingHeadRgb { color, movement } => {
                color.channels().chain(movement.channels()).collect()
            }
            FixtureLayout::MovingHeadWheel { wheel, movement } => {
                wheel.channels().chain(movement.channels()).collect()
            }
        };

        [self.master_dim_channel, self.shutter_channel]
            .into_iter()
            .chain(self.reset.map(|r| r.channel))
            .chain(layout_channels)
            .try_for_each(|channel| {
                if (1..=FIXTURE_WINDOW as u16).contains(&channel) {
                    Ok(())
                } else {
                    Err(CoreError::InvalidChannel {
                        fixture: self.name.clone(),
                        channel,
                    })
                }
            })
    }

    pub fn state(&self) -> &FixtureState {
        &self.state
    }

    /// Last time the rendered state changed, `None` if it never did
    pub fn updated_at(&self) -> Option<Instant> {
        self.updated_at
    }

    /// Whether the rendered state changed at or after `reference`
    pub fn has_updated_since(&self, reference: Instant) -> bool {
        self.updated_at.map_or(true, |t| t >= reference)
    }

    fn update(&mut self, apply: impl FnOnce(&mut FixtureState, &FixtureLayout)) {
        let mut next = self.state.clone();
        apply(&mut next, &self.layout);
        if next != self.state {
            self.state = next;
            self.updated_at = Some(Instant::now());
        }
    }

    pub fn set_master_dimmer(&mut self, value: u8) {
        self.update(|s, _| s.master_dim = value);
    }

    /// Set a named color. Wheel fixtures select the closest wheel slot.
    pub fn set_color(&mut self, color: RgbColor) {
        self.update(|s, layout| match layout.color() {
            Some(channels) => s.color = channels.mask(color.spec()),
            None => s.wheel_color = Some(color.wheel_color()),
        });
    }

    /// Set raw color-mixing values. Ignored by wheel fixtures.
    pub fn set_color_spec(&mut self, spec: ColorSpec) {
        self.update(|s, layout| {
            if let Some(channels) = layout.color() {
                s.color = channels.mask(spec);
            }
        });
    }

    pub fn set_shutter(&mut self, shutter: ShutterOption) {
        self.update(|s, _| s.shutter = shutter);
    }

    /// Set the 16-bit pan/tilt target. Ignored by fixtures that cannot move.
    pub fn set_movement(&mut self, pan: u16, tilt: u16) {
        self.update(|s, layout| {
            if let Some(movement) = layout.movement() {
                s.pan = if movement.fine_pan.is_some() {
                    pan
                } else {
                    pan & 0xFF00
                };
                s.tilt = if movement.fine_tilt.is_some() {
                    tilt
                } else {
                    tilt & 0xFF00
                };
            }
        });
    }

    pub fn set_moving_speed(&mut self, speed: u8) {
        self.update(|s, layout| {
            if layout.movement().is_some_and(|m| m.moving_speed.is_some()) {
                s.moving_speed = speed;
            }
        });
    }

    /// Select a gobo by name; unknown names are ignored
    pub fn set_gobo(&mut self, gobo: Option<&str>) {
        self.update(|s, layout| {
            if let Some(wheel) = layout.wheel() {
                match gobo {
                    Some(name) if wheel.gobo_wheel_values.iter().any(|v| v.name == name) => {
                        s.gobo = Some(name.to_string());
                    }
                    Some(_) => {}
                    None => s.gobo = None,
                }
            }
        });
    }

    /// Hold the reset channel at its reset value. No-op without a reset channel.
    pub fn set_reset(&mut self, reset: bool) {
        let can_reset = self.reset.is_some();
        self.update(|s, _| s.reset = reset && can_reset);
    }

    /// Turn the light off without touching its other state
    pub fn blackout(&mut self) {
        self.set_master_dimmer(0);
    }

    /// Encode the current state into the fixture's 16-channel window
    pub fn to_dmx(&self) -> [u8; FIXTURE_WINDOW] {
        let mut window = [0u8; FIXTURE_WINDOW];
        let mut put = |channel: u16, value: u8| {
            if let Some(slot) = (channel as usize)
                .checked_sub(1)
                .and_then(|i| window.get_mut(i))
            {
                *slot = value;
            }
        };

        let s = &self.state;
        put(self.master_dim_channel, s.master_dim);
        put(
            self.shutter_channel,
            self.shutter_options.get(&s.shutter).copied().unwrap_or(0),
        );

        if let Some(color) = self.layout.color() {
            put(color.red, s.color.red);
            put(color.green, s.color.green);
            put(color.blue, s.color.blue);
            let optional = [
                (color.cold_white, s.color.cold_white),
                (color.warm_white, s.color.warm_white),
                (color.amber, s.color.amber),
                (color.uv, s.color.uv),
            ];
            for (channel, value) in optional {
                if let Some(channel) = channel {
                    put(channel, value);
                }
            }
        }

        if let Some(movement) = self.layout.movement() {
            let [pan_coarse, pan_fine] = s.pan.to_be_bytes();
            let [tilt_coarse, tilt_fine] = s.tilt.to_be_bytes();
            put(movement.pan, pan_coarse);
            put(movement.tilt, tilt_coarse);
            if let Some(channel) = movement.fine_pan {
                put(channel, pan_fine);
            }
            if let Some(channel) = movement.fine_tilt {
                put(channel, tilt_fine);
            }
            if let Some(channel) = movement.moving_speed {
                put(channel, s.moving_speed);
            }
        }

        if let Some(wheel) = self.layout.wheel() {
            let color_value = s
                .wheel_color
                .and_then(|c| wheel.color_wheel_values.iter().find(|v| v.name == c))
                .map_or(0, |v| v.value);
            put(wheel.color_wheel, color_value);
            put(wheel.gobo_wheel, lookup(&wheel.gobo_wheel_values, &s.gobo));
            if let Some(channel) = wheel.gobo_rotate {
                put(channel, lookup(&wheel.gobo_rotate_values, &s.gobo_rotate));
            }
        }

        if let (true, Some(reset)) = (s.reset, self.reset) {
            put(reset.channel, reset.value);
        }

        window
    }

    /// Interpret a channel window using this fixture's layout
    pub fn decode_dmx(&self, window: &[u8]) -> FixtureState {
        let get = |channel: u16| -> u8 {
            (channel as usize)
                .checked_sub(1)
                .and_then(|i| window.get(i))
                .copied()
                .unwrap_or(0)
        };
        let get_opt = |channel: Option<u16>| channel.map_or(0, get);

        let shutter_raw = get(self.shutter_channel);
        let shutter = self
            .shutter_options
            .iter()
            .find(|(_, v)| **v == shutter_raw)
            .map(|(option, _)| *option)
            .unwrap_or_default();

        let mut state = FixtureState {
            master_dim: get(self.master_dim_channel),
            shutter,
            ..FixtureState::default()
        };

        if let Some(color) = self.layout.color() {
            state.color = ColorSpec {
                red: get(color.red),
                green: get(color.green),
                blue: get(color.blue),
                cold_white: get_opt(color.cold_white),
                warm_white: get_opt(color.warm_white),
                amber: get_opt(color.amber),
                uv: get_opt(color.uv),
            };
        }

        if let Some(movement) = self.layout.movement() {
            state.pan = u16::from_be_bytes([get(movement.pan), get_opt(movement.fine_pan)]);
            state.tilt = u16::from_be_bytes([get(movement.tilt), get_opt(movement.fine_tilt)]);
            state.moving_speed = get_opt(movement.moving_speed);
        }

        if let Some(wheel) = self.layout.wheel() {
            let raw = get(wheel.color_wheel);
            state.wheel_color = wheel
                .color_wheel_values
                .iter()
                .find(|v| v.value == raw)
                .map(|v| v.name);
            state.gobo = reverse_lookup(&wheel.gobo_wheel_values, get(wheel.gobo_wheel));
            state.gobo_rotate = wheel
                .gobo_rotate
                .and_then(|c| reverse_lookup(&wheel.gobo_rotate_values, get(c)));
        }

        if let Some(reset) = self.reset {
            state.reset = reset.value != 0 && get(reset.channel) == reset.value;
        }

        state
    }
}

fn lookup(values: &[NamedValue<String>], name: &Option<String>) -> u8 {
    name.as_ref()
        .and_then(|n| values.iter().find(|v| &v.name == n))
        .map_or(0, |v| v.value)
}

fn reverse_lookup(values: &[NamedValue<String>], raw: u8) -> Option<String> {
    values
        .iter()
        .find(|v| v.value == raw)
        .map(|v| v.name.clone())
}
