use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToggleState {
    On,
    Off,
}

impl From<bool> for ToggleState {
    fn from(enabled: bool) -> Self {
        if enabled {
            ToggleState::On
        } else {
            ToggleState::Off
        }
    }
}

/// The quick ON/OFF button shown above the chat log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickToggle {
    pub state: ToggleState,
    pub visible: bool,
}

impl QuickToggle {
    pub fn new(enabled: bool, visible: bool) -> Self {
        Self {
            state: enabled.into(),
            visible,
        }
    }

    pub fn is_on(&self) -> bool {
        self.state == ToggleState::On
    }

    /// Flips the state and returns the new enabled value.
    pub fn click(&mut self) -> bool {
        self.state = (!self.is_on()).into();
        self.is_on()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.state = enabled.into();
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn label(&self) -> &'static str {
        match self.state {
            ToggleState::On => "ON",
            ToggleState::Off => "OFF",
        }
    }

    pub fn visibility_class(&self) -> &'static str {
        if self.visible { "trvisible" } else { "trhidden" }
    }
}
