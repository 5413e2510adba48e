//! Lighting groups and the controllers they are wired to

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::fixture::{Fixture, FIXTURE_WINDOW};

/// Number of channels in one DMX universe
pub const UNIVERSE_SIZE: usize = 512;

pub type GroupId = u32;
pub type ControllerId = u32;

/// A group behind its single-writer lock.
///
/// Effects, handlers and the compositor all go through this lock, so a beat
/// and a tick never mutate the same group at the same time.
pub type SharedGroup = Arc<Mutex<LightsGroup>>;

/// A fixture placed in a group at a DMX address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupFixture {
    pub id: u32,
    /// 1-based DMX address of the fixture's first channel
    pub first_channel: u16,
    #[serde(default)]
    pub position_x: f64,
    #[serde(default)]
    pub position_y: f64,
    pub fixture: Fixture,
}

impl GroupFixture {
    /// Universe channels occupied by this fixture, clamped to the universe
    pub fn window(&self) -> std::ops::Range<usize> {
        let start = (self.first_channel as usize).saturating_sub(1);
        start..(start + FIXTURE_WINDOW).min(UNIVERSE_SIZE)
    }
}

/// Named collection of fixtures driven together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightsGroup {
    pub id: GroupId,
    pub name: String,
    pub controller_id: ControllerId,
    #[serde(default)]
    pub grid_size_x: f64,
    #[serde(default)]
    pub grid_size_y: f64,
    #[serde(default)]
    pub pars: Vec<GroupFixture>,
    #[serde(default)]
    pub moving_head_rgbs: Vec<GroupFixture>,
    #[serde(default)]
    pub moving_head_wheels: Vec<GroupFixture>,
}

impl LightsGroup {
    pub fn new(id: GroupId, name: impl Into<String>, controller_id: ControllerId) -> Self {
        Self {
            id,
            name: name.into(),
            controller_id,
            grid_size_x: 0.0,
            grid_size_y: 0.0,
            pars: Vec::new(),
            moving_head_rgbs: Vec::new(),
            moving_head_wheels: Vec::new(),
        }
    }

    pub fn into_shared(self) -> SharedGroup {
        Arc::new(Mutex::new(self))
    }

    /// All fixtures: pars, then RGB moving heads, then wheel moving heads
    pub fn fixtures(&self) -> impl Iterator<Item = &GroupFixture> {
        self.pars
            .iter()
            .chain(self.moving_head_rgbs.iter())
            .chain(self.moving_head_wheels.iter())
    }

    pub fn fixtures_mut(&mut self) -> impl Iterator<Item = &mut GroupFixture> {
        self.pars
            .iter_mut()
            .chain(self.moving_head_rgbs.iter_mut())
            .chain(self.moving_head_wheels.iter_mut())
    }

    /// Moving heads of either kind
    pub fn moving_heads_mut(&mut self) -> impl Iterator<Item = &mut GroupFixture> {
        self.moving_head_rgbs
            .iter_mut()
            .chain(self.moving_head_wheels.iter_mut())
    }

    pub fn fixture_count(&self) -> usize {
        self.pars.len() + self.moving_head_rgbs.len() + self.moving_head_wheels.len()
    }

    /// Set every master dimmer to zero
    pub fn blackout(&mut self) {
        for p in self.fixtures_mut() {
            p.fixture.blackout();
        }
    }

    /// Validate fixture channels and addressing within this group
    pub fn validate(&self) -> Result<()> {
        for p in self.fixtures() {
            p.fixture.validate()?;
            if !(1..=UNIVERSE_SIZE as u16).contains(&p.first_channel) {
                return Err(CoreError::InvalidAddress {
                    fixture: p.fixture.name.clone(),
                    first_channel: p.first_channel,
                });
            }
        }
        validate_universe_layout(std::iter::once(self))
    }
}

/// Check that no two fixtures on one controller share channels.
///
/// Every fixture reserves a full 16-channel window, since the compositor
/// copies whole windows when a fixture did not change.
pub fn validate_universe_layout<'a>(
    groups: impl IntoIterator<Item = &'a LightsGroup>,
) -> Result<()> {
    let mut per_controller: BTreeMap<ControllerId, Vec<u16>> = BTreeMap::new();
    for group in groups {
        per_controller
            .entry(group.controller_id)
            .or_default()
            .extend(group.fixtures().map(|p| p.first_channel));
    }

    for (controller, mut channels) in per_controller {
        channels.sort_unstable();
        for pair in channels.windows(2) {
            if (pair[1] as usize) < pair[0] as usize + FIXTURE_WINDOW {
                return Err(CoreError::OverlappingChannels {
                    controller,
                    first: pair[0],
                    second: pair[1],
                });
            }
        }
    }
    Ok(())
}

/// A hardware DMX controller owning one universe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightsController {
    pub id: ControllerId,
    pub name: String,
    /// Transport endpoint per namespace
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
}

impl LightsController {
    pub fn new(id: ControllerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            endpoints: BTreeMap::new(),
        }
    }

    pub fn with_endpoint(mut self, namespace: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.endpoints.insert(namespace.into(), endpoint.into());
        self
    }

    /// Endpoint registered for `namespace`, if any
    pub fn endpoint(&self, namespace: &str) -> Option<&str> {
        self.endpoints.get(namespace).map(String::as_str)
    }
}
