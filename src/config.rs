use crate::integrator::Mode;
use crate::map_engine::MapProperties;
use crate::stencil::StencilKind;
use serde::{Deserialize, Serialize};

fn default_stencil() -> StencilKindConfig {
    StencilKindConfig::Triplet
}

/// Serde mirror of `StencilKind`, since the enum itself lives in a module
/// that doesn't need a `serde` dependency.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StencilKindConfig {
    Triplet,
    Quintuplet,
}

impl From<StencilKindConfig> for StencilKind {
    fn from(value: StencilKindConfig) -> Self {
        match value {
            StencilKindConfig::Triplet => StencilKind::Triplet,
            StencilKindConfig::Quintuplet => StencilKind::Quintuplet,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeConfig {
    Fsle,
    Ftle,
}

impl From<ModeConfig> for Mode {
    fn from(value: ModeConfig) -> Self {
        match value {
            ModeConfig::Fsle => Mode::Fsle,
            ModeConfig::Ftle => Mode::Ftle,
        }
    }
}

/// The output grid a map is evaluated on.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeshConfig {
    pub nx: usize,
    pub ny: usize,
    pub x_min: f64,
    pub y_min: f64,
    pub step: f64,
}

impl From<MeshConfig> for MapProperties {
    fn from(value: MeshConfig) -> Self {
        MapProperties { nx: value.nx, ny: value.ny, x_min: value.x_min, y_min: value.y_min, step: value.step }
    }
}

/// The run-level control knobs: time window, integration step, stencil
/// separation parameters, thread count. Named after and shaped like the
/// teacher's `app::Control`, including the "0 means let the platform
/// decide" convention for `num_threads`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Control {
    pub start_time: f64,
    pub final_time: f64,
    pub time_increment: f64,
    pub integration_step: f64,
    pub delta: f64,
    #[serde(default)]
    pub min_separation: f64,
    #[serde(default)]
    pub mode: Option<ModeConfig>,
    #[serde(default = "default_stencil")]
    pub stencil: StencilKindConfig,
    #[serde(default)]
    pub num_threads: Option<usize>,
}

impl Control {
    /// Resolves `num_threads`: `None` (or the explicit `0` the original
    /// config-file format would carry) picks up the platform's reported
    /// core count, matching `app::Control::num_threads()`.
    pub fn resolved_threads(&self) -> usize {
        match self.num_threads {
            Some(0) | None => num_cpus::get(),
            Some(n) => n,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.final_time == self.start_time {
            anyhow::bail!("final_time must differ from start_time");
        }
        if self.integration_step == 0.0 {
            anyhow::bail!("integration_step must be non-zero");
        }
        if self.delta <= 0.0 {
            anyhow::bail!("delta must be positive");
        }
        Ok(())
    }
}

/// The top-level run configuration: a mesh plus a control block, loadable
/// from YAML in the style of the teacher's `app::Configuration`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    pub mesh: MeshConfig,
    pub control: Control,
}

impl Configuration {
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        let config: Configuration = serde_yaml::from_str(text)?;
        config.control.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_minimal_configuration() {
        let yaml = r#"
mesh:
  nx: 10
  ny: 10
  x_min: -5.0
  y_min: -5.0
  step: 1.0
control:
  start_time: 0.0
  final_time: 10.0
  time_increment: 0.5
  integration_step: 0.1
  delta: 0.01
"#;
        let config = Configuration::from_yaml(yaml).unwrap();
        assert_eq!(config.mesh.nx, 10);
        assert_eq!(config.control.resolved_threads() > 0, true);
    }

    #[test]
    fn rejects_a_zero_length_time_window() {
        let yaml = r#"
mesh:
  nx: 1
  ny: 1
  x_min: 0.0
  y_min: 0.0
  step: 1.0
control:
  start_time: 0.0
  final_time: 0.0
  time_increment: 0.5
  integration_step: 0.1
  delta: 0.01
"#;
        assert!(Configuration::from_yaml(yaml).is_err());
    }

    #[test]
    fn zero_num_threads_resolves_to_platform_hint() {
        let control = Control {
            start_time: 0.0, final_time: 1.0, time_increment: 0.1, integration_step: 0.1,
            delta: 0.01, min_separation: 0.0, mode: None, stencil: StencilKindConfig::Triplet,
            num_threads: Some(0),
        };
        assert_eq!(control.resolved_threads(), num_cpus::get());
    }
}
