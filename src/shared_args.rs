use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigError, MicroscopeConfig};
use crate::parameters::ParameterPreset;

/// Parse a volume size in format "width,height,depth"
fn parse_volume(s: &str) -> Result<(usize, usize, usize), String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err("Volume must be in format 'width,height,depth'".to_string());
    }

    let parse = |name: &str, part: &str| {
        part.trim()
            .parse::<usize>()
            .map_err(|_| format!("Invalid {name} value"))
    };

    Ok((
        parse("width", parts[0])?,
        parse("height", parts[1])?,
        parse("depth", parts[2])?,
    ))
}

/// Common arguments shared across simulation binaries
#[derive(Parser, Debug, Clone)]
pub struct SharedSimulationArgs {
    /// JSON microscope configuration; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON parameter preset applied after the configuration's own overrides
    #[arg(long)]
    pub preset: Option<PathBuf>,

    /// Main volume size (format: "width,height,depth")
    #[arg(long, value_parser = parse_volume)]
    pub volume: Option<(usize, usize, usize)>,

    /// Number of detection paths
    #[arg(long)]
    pub detection_paths: Option<usize>,

    /// Number of illumination arms
    #[arg(long)]
    pub illumination_arms: Option<usize>,

    /// Camera sensor side length in pixels
    #[arg(long)]
    pub camera_resolution: Option<usize>,

    /// Seed for camera noise
    #[arg(long)]
    pub seed: Option<u64>,

    /// Enable debug output
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

impl SharedSimulationArgs {
    /// Configuration file (or defaults) with command-line overrides applied
    pub fn microscope_config(&self) -> Result<MicroscopeConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => MicroscopeConfig::from_json_file(path)?,
            None => MicroscopeConfig::default(),
        };
        if let Some(volume) = self.volume {
            config.volume = volume;
        }
        if let Some(n) = self.detection_paths {
            config.detection_paths = n;
        }
        if let Some(n) = self.illumination_arms {
            config.illumination_arms = n;
        }
        if let Some(resolution) = self.camera_resolution {
            config.camera_resolution = resolution;
        }
        if self.seed.is_some() {
            config.noise_seed = self.seed;
        }
        Ok(config)
    }

    /// Extra preset given with `--preset`, if any
    pub fn preset(&self) -> Result<Option<ParameterPreset>, ConfigError> {
        self.preset
            .as_ref()
            .map(ParameterPreset::from_file)
            .transpose()
            .map_err(ConfigError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        shared: SharedSimulationArgs,
    }

    #[test]
    fn test_parse_volume() {
        assert_eq!(parse_volume("64, 32,16"), Ok((64, 32, 16)));
        assert!(parse_volume("64,32").is_err());
        assert!(parse_volume("64,x,16").is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = TestCli::parse_from([
            "test",
            "--volume",
            "32,32,16",
            "--detection-paths",
            "1",
            "--seed",
            "5",
        ]);
        let config = cli.shared.microscope_config().unwrap();
        assert_eq!(config.volume, (32, 32, 16));
        assert_eq!(config.detection_paths, 1);
        assert_eq!(config.illumination_arms, 2);
        assert_eq!(config.noise_seed, Some(5));
        assert!(cli.shared.preset().unwrap().is_none());
    }
}
