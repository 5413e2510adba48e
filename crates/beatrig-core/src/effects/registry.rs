//! Name-keyed effect construction
//!
//! Scenes and config files refer to effects by name with a JSON blob of
//! properties. The registry turns that pair into a [`LightsEffect`].

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{BeatFadeOut, FixedPattern, LightsEffect, SearchLight, Sparkle, Wave};
use crate::error::{CoreError, Result};
use crate::group::SharedGroup;
use crate::music::TrackFeatures;

/// Builds an effect for a group from its JSON properties
pub type EffectBuilder =
    fn(SharedGroup, Value, Option<&TrackFeatures>) -> Result<LightsEffect>;

pub struct EffectRegistry {
    builders: BTreeMap<String, EffectBuilder>,
}

impl EffectRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    /// A registry with every built-in effect
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(BeatFadeOut::NAME, |group, props, features| {
            Ok(BeatFadeOut::new(group, parse(BeatFadeOut::NAME, props)?, features)?.into())
        });
        registry.register(Sparkle::NAME, |group, props, _| {
            Ok(Sparkle::new(group, parse(Sparkle::NAME, props)?)?.into())
        });
        registry.register(Wave::NAME, |group, props, _| {
            Ok(Wave::new(group, parse(Wave::NAME, props)?).into())
        });
        registry.register(FixedPattern::NAME, |group, props, _| {
            Ok(FixedPattern::new(group, parse(FixedPattern::NAME, props)?)?.into())
        });
        registry.register(SearchLight::NAME, |group, props, _| {
            Ok(SearchLight::new(group, parse(SearchLight::NAME, props)?).into())
        });
        registry
    }

    /// Add or replace the builder for `name`
    pub fn register(&mut self, name: impl Into<String>, builder: EffectBuilder) {
        self.builders.insert(name.into(), builder);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    /// Instantiate the effect `name` for `group`
    pub fn create(
        &self,
        name: &str,
        group: SharedGroup,
        props: Value,
        features: Option<&TrackFeatures>,
    ) -> Result<LightsEffect> {
        let builder = self
            .builders
            .get(name)
            .ok_or_else(|| CoreError::UnknownEffect(name.to_string()))?;
        builder(group, props, features)
    }
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn parse<T: DeserializeOwned>(effect: &str, props: Value) -> Result<T> {
    let props = match props {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(props).map_err(|e| CoreError::InvalidEffectProps {
        effect: effect.to_string(),
        reason: e.to_string(),
    })
}
