// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
#![forbid(unsafe_code)]

use crate::Error;
use std::fmt;

pub use uvcholder_sys::{
    CTRL_AE, CTRL_AE_ABS, CTRL_AE_PRIORITY, CTRL_FOCUS_ABS, CTRL_FOCUS_AUTO, CTRL_IRIS_ABS,
    CTRL_PAN_ABS, CTRL_PRIVACY, CTRL_ROLL_ABS, CTRL_SCANNING, CTRL_TILT_ABS, CTRL_ZOOM_ABS,
    PU_BACKLIGHT, PU_BRIGHTNESS, PU_CONTRAST, PU_CONTRAST_AUTO, PU_GAIN, PU_GAMMA, PU_HUE,
    PU_HUE_AUTO, PU_MASK, PU_POWER_LF, PU_SATURATION, PU_SHARPNESS, PU_WB_COMPO,
    PU_WB_COMPO_AUTO, PU_WB_TEMP, PU_WB_TEMP_AUTO,
};

/// Opaque 64-bit control identifier understood by the driver.
pub type ControlId = u64;

// Camera-terminal bit shared by pan and tilt.
const PAN_TILT_BIT: u64 = CTRL_PAN_ABS & 0x00ff_ffff;

const KNOWN_CONTROLS: &[(ControlId, &str)] = &[
    (CTRL_SCANNING, "scanning"),
    (CTRL_AE, "ae_mode"),
    (CTRL_AE_PRIORITY, "ae_priority"),
    (CTRL_AE_ABS, "exposure_abs"),
    (CTRL_FOCUS_ABS, "focus_abs"),
    (CTRL_IRIS_ABS, "iris_abs"),
    (CTRL_ZOOM_ABS, "zoom_abs"),
    (CTRL_PAN_ABS, "pan_abs"),
    (CTRL_TILT_ABS, "tilt_abs"),
    (CTRL_ROLL_ABS, "roll_abs"),
    (CTRL_FOCUS_AUTO, "focus_auto"),
    (CTRL_PRIVACY, "privacy"),
    (PU_BRIGHTNESS | PU_MASK, "brightness"),
    (PU_CONTRAST | PU_MASK, "contrast"),
    (PU_HUE | PU_MASK, "hue"),
    (PU_SATURATION | PU_MASK, "saturation"),
    (PU_SHARPNESS | PU_MASK, "sharpness"),
    (PU_GAMMA | PU_MASK, "gamma"),
    (PU_WB_TEMP | PU_MASK, "white_balance_temperature"),
    (PU_WB_COMPO | PU_MASK, "white_balance_component"),
    (PU_BACKLIGHT | PU_MASK, "backlight_compensation"),
    (PU_GAIN | PU_MASK, "gain"),
    (PU_POWER_LF | PU_MASK, "power_line_frequency"),
    (PU_HUE_AUTO | PU_MASK, "hue_auto"),
    (PU_WB_TEMP_AUTO | PU_MASK, "white_balance_temperature_auto"),
    (PU_WB_COMPO_AUTO | PU_MASK, "white_balance_component_auto"),
    (PU_CONTRAST_AUTO | PU_MASK, "contrast_auto"),
];

/// Human readable name of a control, if it is one of the known UVC controls.
pub fn control_name(id: ControlId) -> Option<&'static str> {
    KNOWN_CONTROLS
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, name)| *name)
}

/// Parse a control given by name or as a hex / decimal identifier.
pub fn parse_control(s: &str) -> Result<ControlId, Error> {
    let s = s.trim();
    if let Some((id, _)) = KNOWN_CONTROLS
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(s))
    {
        return Ok(*id);
    }
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|_| Error::InvalidArgument(format!("unknown control '{}'", s)))
}

/// Whether the identifier addresses a processing-unit control.
pub fn is_processing_unit(id: ControlId) -> bool {
    id & PU_MASK == PU_MASK
}

/// The set of controls a device supports, sorted ascending.
///
/// Built from the driver's camera-terminal and processing-unit bitmasks.
/// The single pan/tilt bit expands into separate pan and tilt controls and
/// processing-unit bits are tagged with [`PU_MASK`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlCapabilities {
    ids: Vec<ControlId>,
}

impl ControlCapabilities {
    pub fn from_masks(ctrls: u64, procs: u64) -> Self {
        let mut ids = Vec::new();
        for i in 0..32 {
            let bit = 1u64 << i;
            if ctrls & bit == bit {
                if bit == PAN_TILT_BIT {
                    ids.push(CTRL_PAN_ABS);
                    ids.push(CTRL_TILT_ABS);
                } else {
                    ids.push(bit);
                }
            }
            if procs & bit == bit {
                ids.push(bit | PU_MASK);
            }
        }
        ids.sort_unstable();
        ControlCapabilities { ids }
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn ids(&self) -> &[ControlId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ControlId> + '_ {
        self.ids.iter().copied()
    }
}

/// Range and value information for a single control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlInfo {
    pub control: ControlId,
    pub initialized: bool,
    pub has_min_max: bool,
    pub default: i32,
    pub current: i32,
    pub resolution: i32,
    pub min: i32,
    pub max: i32,
}

impl ControlInfo {
    pub fn name(&self) -> Option<&'static str> {
        control_name(self.control)
    }
}

impl fmt::Display for ControlInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name)?,
            None => write!(f, "0x{:08x}", self.control)?,
        }
        write!(f, " = {} (default {}", self.current, self.default)?;
        if self.has_min_max {
            write!(f, ", range {}..={} step {}", self.min, self.max, self.resolution)?;
        }
        write!(f, ")")
    }
}
