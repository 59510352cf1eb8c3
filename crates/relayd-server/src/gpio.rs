//! Sysfs GPIO actuation backend.
//!
//! Drives relay channels through `/sys/class/gpio`. Lines are probed once at
//! construction: exported, set to output, and driven low. A line that fails
//! any probe step drops its channel from the availability set instead of
//! failing startup, so the daemon runs relay-only on machines without the
//! hardware.
//!
//! Local GPIO is the single-hardware deployment; the slot index of an
//! actuation call does not select a different line set.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use relayd_core::{ActuationError, Actuator};

use crate::error::{Result, ServerError};

pub struct SysfsActuator {
    base: PathBuf,
    lines: BTreeMap<u8, u32>,
    available: BTreeSet<u8>,
}

impl SysfsActuator {
    /// Probe `lines` (channel number to GPIO line) under `/sys/class/gpio`
    /// and drive every surviving line low.
    #[must_use]
    pub fn new(lines: &BTreeMap<u8, u32>) -> Self {
        Self::with_base(Path::new("/sys/class/gpio"), lines)
    }

    /// Same as [`Self::new`] with an explicit sysfs root.
    #[must_use]
    pub fn with_base(base: &Path, lines: &BTreeMap<u8, u32>) -> Self {
        let mut probed = BTreeMap::new();
        for (&channel, &line) in lines {
            match probe_line(base, line) {
                Ok(()) => {
                    info!("channel {channel}: GPIO line {line} ready");
                    probed.insert(channel, line);
                }
                Err(err) => {
                    warn!("channel {channel}: GPIO line {line} unavailable: {err}");
                }
            }
        }
        let available = probed.keys().copied().collect();
        let mut actuator = Self {
            base: base.to_path_buf(),
            lines: probed,
            available,
        };
        actuator.stop_all();
        actuator
    }

    /// Drive everything low and unexport the lines. Called on graceful
    /// shutdown; the actuator is unusable afterwards.
    pub fn release(&mut self) {
        self.stop_all();
        for (&channel, &line) in &self.lines {
            debug!("releasing channel {channel} (GPIO {line})");
            if let Err(err) = std::fs::write(self.base.join("unexport"), line.to_string()) {
                debug!("unexport of GPIO {line} failed: {err}");
            }
        }
        self.lines.clear();
        self.available.clear();
    }

    fn value_path(&self, line: u32) -> PathBuf {
        self.base.join(format!("gpio{line}")).join("value")
    }
}

fn probe_line(base: &Path, line: u32) -> Result<()> {
    let dir = base.join(format!("gpio{line}"));
    if !dir.exists() {
        // An already-exported line makes this write fail, which is fine;
        // what matters is whether the line directory shows up.
        let _ = std::fs::write(base.join("export"), line.to_string());
    }
    if !dir.join("value").exists() {
        return Err(ServerError::Gpio(format!("line {line} did not export")));
    }
    std::fs::write(dir.join("direction"), "out")
        .map_err(|err| ServerError::Gpio(format!("line {line} direction: {err}")))?;
    Ok(())
}

impl Actuator for SysfsActuator {
    fn available_channels(&self) -> &BTreeSet<u8> {
        &self.available
    }

    fn actuate(
        &mut self,
        _slot: usize,
        channel: u8,
        state: bool,
    ) -> std::result::Result<(), ActuationError> {
        let Some(&line) = self.lines.get(&channel) else {
            return Err(ActuationError(format!("channel {channel} has no GPIO line")));
        };
        debug!("GPIO {line} <- {}", u8::from(state));
        std::fs::write(self.value_path(line), if state { "1" } else { "0" })
            .map_err(|err| ActuationError(format!("GPIO {line}: {err}")))
    }

    fn stop_all(&mut self) {
        for (&channel, &line) in &self.lines {
            if std::fs::write(self.value_path(line), "0").is_err() {
                warn!("failed to drive channel {channel} (GPIO {line}) low");
            }
        }
    }

    fn shutdown(&mut self) {
        self.release();
    }
}
