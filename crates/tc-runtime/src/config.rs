use std::fmt;
use std::str::FromStr;

use crate::device::DeviceLimits;
use crate::error::{Result, RuntimeError};

/// How the lanes of a work-group are scheduled on the CPU device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Lanes run as free threads and meet at real barriers.
    #[default]
    Concurrent,
    /// Lanes run one at a time in local-id order, switching at barriers.
    /// Slower, but every interleaving is reproducible.
    Lockstep,
}

impl FromStr for ExecutionMode {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "concurrent" => Ok(ExecutionMode::Concurrent),
            "lockstep" => Ok(ExecutionMode::Lockstep),
            other => Err(RuntimeError::Configuration(format!(
                "unknown execution mode '{other}', expected 'concurrent' or 'lockstep'"
            ))),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Concurrent => write!(f, "concurrent"),
            ExecutionMode::Lockstep => write!(f, "lockstep"),
        }
    }
}

/// Per-dispatch settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Blocking factor `T`: work-group size and scratch tile length.
    pub tile_size: usize,
    /// Count writes to the result buffer and report them.
    pub track_writes: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            tile_size: 16,
            track_writes: false,
        }
    }
}

impl DispatchConfig {
    pub fn new(tile_size: usize) -> Self {
        DispatchConfig {
            tile_size,
            ..Default::default()
        }
    }

    pub fn with_write_tracking(mut self) -> Self {
        self.track_writes = true;
        self
    }

    /// Read settings from a key-value source, keeping defaults for missing keys.
    ///
    /// Keys:
    /// - `TC_TILE_SIZE` -> tile_size (default 16)
    /// - `TC_TRACK_WRITES` -> track_writes (default false)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = DispatchConfig::default();
        Ok(DispatchConfig {
            tile_size: parse_key(&lookup, "TC_TILE_SIZE")?.unwrap_or(defaults.tile_size),
            track_writes: parse_flag(&lookup, "TC_TRACK_WRITES")?.unwrap_or(defaults.track_writes),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Settings for constructing a [`CpuDevice`](crate::CpuDevice).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Work-group slots running at once.
    pub compute_units: usize,
    pub execution_mode: ExecutionMode,
    pub limits: DeviceLimits,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let compute_units = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .min(8);
        DeviceConfig {
            compute_units,
            execution_mode: ExecutionMode::default(),
            limits: DeviceLimits::default(),
        }
    }
}

impl DeviceConfig {
    pub fn with_compute_units(mut self, compute_units: usize) -> Self {
        self.compute_units = compute_units;
        self
    }

    pub fn with_execution_mode(mut self, execution_mode: ExecutionMode) -> Self {
        self.execution_mode = execution_mode;
        self
    }

    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Read settings from a key-value source, keeping defaults for missing keys.
    ///
    /// Keys:
    /// - `TC_COMPUTE_UNITS` -> compute_units
    /// - `TC_EXECUTION_MODE` -> execution_mode (`concurrent` | `lockstep`)
    /// - `TC_LOCAL_MEM_SIZE` -> limits.local_mem_size (bytes)
    /// - `TC_GLOBAL_MEM_SIZE` -> limits.global_mem_size (bytes)
    /// - `TC_MAX_WORK_GROUP_SIZE` -> limits.max_work_group_size
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = DeviceConfig::default();
        let compute_units = parse_key(&lookup, "TC_COMPUTE_UNITS")?.unwrap_or(defaults.compute_units);
        if compute_units == 0 {
            return Err(RuntimeError::Configuration(
                "TC_COMPUTE_UNITS must be greater than zero".to_string(),
            ));
        }
        Ok(DeviceConfig {
            compute_units,
            execution_mode: parse_key(&lookup, "TC_EXECUTION_MODE")?.unwrap_or(defaults.execution_mode),
            limits: DeviceLimits {
                local_mem_size: parse_key(&lookup, "TC_LOCAL_MEM_SIZE")?
                    .unwrap_or(defaults.limits.local_mem_size),
                global_mem_size: parse_key(&lookup, "TC_GLOBAL_MEM_SIZE")?
                    .unwrap_or(defaults.limits.global_mem_size),
                max_work_group_size: parse_key(&lookup, "TC_MAX_WORK_GROUP_SIZE")?
                    .unwrap_or(defaults.limits.max_work_group_size),
            },
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

fn parse_key<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| {
            RuntimeError::Configuration(format!("invalid value '{raw}' for {key}: {e}"))
        }),
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(RuntimeError::Configuration(format!(
            "invalid value '{raw}' for {key}: expected a boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_dispatch_defaults() {
        let c = DispatchConfig::from_lookup(source(&[])).unwrap();
        assert_eq!(c, DispatchConfig::default());
        assert_eq!(c.tile_size, 16);
        assert!(!c.track_writes);
    }

    #[test]
    fn test_dispatch_overrides() {
        let c = DispatchConfig::from_lookup(source(&[("TC_TILE_SIZE", " 8 "), ("TC_TRACK_WRITES", "yes")])).unwrap();
        assert_eq!(c, DispatchConfig::new(8).with_write_tracking());
    }

    #[test]
    fn test_flags_ignore_case() {
        for raw in ["TRUE", "Yes", " On "] {
            let c = DispatchConfig::from_lookup(source(&[("TC_TRACK_WRITES", raw)])).unwrap();
            assert!(c.track_writes, "{raw:?} should enable tracking");
        }
        let c = DispatchConfig::from_lookup(source(&[("TC_TRACK_WRITES", "False")])).unwrap();
        assert!(!c.track_writes);
    }

    #[test]
    fn test_dispatch_invalid_values() {
        let err = DispatchConfig::from_lookup(source(&[("TC_TILE_SIZE", "sixteen")])).unwrap_err();
        assert!(matches!(err, RuntimeError::Configuration(_)));
        assert!(DispatchConfig::from_lookup(source(&[("TC_TRACK_WRITES", "maybe")])).is_err());
    }

    #[test]
    fn test_device_overrides() {
        let c = DeviceConfig::from_lookup(source(&[
            ("TC_COMPUTE_UNITS", "3"),
            ("TC_EXECUTION_MODE", "Lockstep"),
            ("TC_LOCAL_MEM_SIZE", "1024"),
        ]))
        .unwrap();
        assert_eq!(c.compute_units, 3);
        assert_eq!(c.execution_mode, ExecutionMode::Lockstep);
        assert_eq!(c.limits.local_mem_size, 1024);
        assert_eq!(c.limits.global_mem_size, DeviceLimits::default().global_mem_size);
    }

    #[test]
    fn test_device_rejects_zero_units() {
        assert!(DeviceConfig::from_lookup(source(&[("TC_COMPUTE_UNITS", "0")])).is_err());
        assert!(DeviceConfig::from_lookup(source(&[("TC_EXECUTION_MODE", "eager")])).is_err());
    }

    #[test]
    fn test_execution_mode_display_round_trip() {
        for mode in [ExecutionMode::Concurrent, ExecutionMode::Lockstep] {
            assert_eq!(mode.to_string().parse::<ExecutionMode>().unwrap(), mode);
        }
    }
}
