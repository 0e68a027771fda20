//! Local OSRM dataset for integration runs.
//!
//! Downloads a Geofabrik extract once, then preprocesses it with the
//! `osrm/osrm-backend` image (extract, partition, customize) so that an
//! `osrm-routed --algorithm mld` container can serve routes from it.
//! Every stage is skipped when its outputs already exist.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::info;

const OSRM_IMAGE: &str = "osrm/osrm-backend";

#[derive(Debug, Error)]
pub enum OsrmDataError {
    #[error("dataset I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("extract download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{stage} exited with {status}")]
    Preprocess { stage: &'static str, status: String },
}

/// A Geofabrik extract, e.g. `europe/sweden`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeofabrikRegion {
    pub path: String,
}

impl GeofabrikRegion {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// The whole of Sweden, where the planner's station data lives.
    pub fn sweden() -> Self {
        Self::new("europe/sweden")
    }

    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("region")
    }

    pub fn url(&self) -> String {
        format!("https://download.geofabrik.de/{}-latest.osm.pbf", self.path)
    }
}

#[derive(Debug, Clone)]
pub struct OsrmDatasetConfig {
    pub region: GeofabrikRegion,
    /// Datasets go to `<data_root>/<region name>/`.
    pub data_root: PathBuf,
    /// Lua profile inside the image.
    pub profile: String,
}

impl OsrmDatasetConfig {
    pub fn new(region: GeofabrikRegion, data_root: impl Into<PathBuf>) -> Self {
        Self {
            region,
            data_root: data_root.into(),
            profile: "/opt/car.lua".to_string(),
        }
    }
}

/// A preprocessed dataset on disk.
#[derive(Debug, Clone)]
pub struct OsrmDataset {
    pub data_dir: PathBuf,
    pub pbf_path: PathBuf,
    /// `<region>-latest.osrm`, the argument `osrm-routed` expects.
    pub osrm_base: PathBuf,
}

impl OsrmDataset {
    pub fn ensure(config: &OsrmDatasetConfig) -> Result<Self, OsrmDataError> {
        let name = config.region.name();
        let data_root = if config.data_root.is_absolute() {
            config.data_root.clone()
        } else {
            std::env::current_dir()?.join(&config.data_root)
        };
        let data_dir = data_root.join(name);
        fs::create_dir_all(&data_dir)?;

        let pbf_path = data_dir.join(format!("{}-latest.osm.pbf", name));
        if !pbf_path.exists() {
            info!(url = %config.region.url(), "downloading extract");
            download(&config.region.url(), &pbf_path)?;
        }

        let dataset = Self {
            osrm_base: data_dir.join(format!("{}-latest.osrm", name)),
            data_dir,
            pbf_path,
        };

        if !dataset.osrm_base.exists() {
            let pbf = dataset.container_path(&dataset.pbf_path);
            dataset.preprocess("osrm-extract", &["-p", &config.profile, &pbf])?;
        }
        if !dataset.is_partitioned() {
            let base = dataset.container_path(&dataset.osrm_base);
            dataset.preprocess("osrm-partition", &[&base])?;
            dataset.preprocess("osrm-customize", &[&base])?;
        }
        Ok(dataset)
    }

    /// `osrm_base` as seen from inside a container with `data_dir` on
    /// `/data`.
    pub fn container_osrm_path(&self) -> String {
        self.container_path(&self.osrm_base)
    }

    fn container_path(&self, path: &Path) -> String {
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("/data/{}", file)
    }

    fn is_partitioned(&self) -> bool {
        ["osrm.partition", "osrm.mldgr", "osrm.cells"]
            .iter()
            .all(|extension| self.osrm_base.with_extension(extension).exists())
    }

    fn preprocess(&self, stage: &'static str, args: &[&str]) -> Result<(), OsrmDataError> {
        info!(stage, data_dir = %self.data_dir.display(), "preprocessing dataset");
        let status = Command::new("docker")
            .args(["run", "--rm", "-t", "-v"])
            .arg(format!("{}:/data", self.data_dir.display()))
            .arg(OSRM_IMAGE)
            .arg(stage)
            .args(args)
            .status()?;

        if status.success() {
            Ok(())
        } else {
            Err(OsrmDataError::Preprocess {
                stage,
                status: status.to_string(),
            })
        }
    }
}

fn download(url: &str, destination: &Path) -> Result<(), OsrmDataError> {
    let bytes = reqwest::blocking::get(url)?.error_for_status()?.bytes()?;
    let partial = destination.with_extension("part");
    let mut writer = BufWriter::new(File::create(&partial)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    fs::rename(partial, destination)?;
    Ok(())
}
