//! Explicit engine services handed to scenes and components

use crate::input::Input;
use crate::resources::Resources;
use crate::scene::LightManager;
use crate::time::Time;

/// State shared by everything a tick touches
#[derive(Debug, Default)]
pub struct EngineContext {
    pub resources: Resources,
    pub lights: LightManager,
    pub time: Time,
    pub input: Input,
}

impl EngineContext {
    pub fn new() -> Self {
        Self::default()
    }
}
