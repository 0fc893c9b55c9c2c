//! Files written by the genetic algorithm in its output directory:
//! * `data.csv`: every evaluated individual,
//! * `populations.csv`: each selected population tagged with its generation,
//! * `vocs.txt`: the problem definition as json,
//! * `checkpoints/<timestamp>_<n>.json`: generator states.
use chrono::Local;
use log::debug;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use xopt_core::{Data, Result, Vocs};

/// All evaluated individuals
pub const DATA_FILE: &str = "data.csv";
/// Selected populations
pub const POPULATIONS_FILE: &str = "populations.csv";
/// Problem definition
pub const VOCS_FILE: &str = "vocs.txt";
/// Checkpoints sub directory
pub const CHECKPOINTS_DIR: &str = "checkpoints";
/// Generation column of populations file
pub const GENERATION_COLUMN: &str = "xopt_generation";

/// Writer of the output directory
#[derive(Clone, Debug)]
pub struct OutputDir {
    path: PathBuf,
    columns: Vec<String>,
}

impl OutputDir {
    /// Creates the directory and writes the problem definition
    pub fn create<P: AsRef<Path>>(path: P, vocs: &Vocs, extra_columns: &[&str]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(path.join(CHECKPOINTS_DIR))?;
        let writer = BufWriter::new(File::create(path.join(VOCS_FILE))?);
        serde_json::to_writer(writer, vocs)?;
        let mut columns = vocs.all_names();
        columns.extend(extra_columns.iter().map(|c| c.to_string()));
        debug!("Output directory {} ready", path.display());
        Ok(OutputDir { path, columns })
    }

    /// Directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends evaluated individuals to the data file
    pub fn append_data(&self, data: &Data) -> Result<()> {
        data.append_csv(self.path.join(DATA_FILE), &self.columns)
    }

    /// Appends a population to the populations file
    pub fn append_population(&self, population: &Data, generation: usize) -> Result<()> {
        let tagged: Data = population
            .iter()
            .cloned()
            .map(|mut r| {
                r.values
                    .insert(GENERATION_COLUMN.to_string(), generation as f64);
                r
            })
            .collect();
        let mut columns = self.columns.clone();
        columns.push(GENERATION_COLUMN.to_string());
        tagged.append_csv(self.path.join(POPULATIONS_FILE), &columns)
    }

    /// Writes a checkpoint named after the current time and the generation
    pub fn checkpoint<S: Serialize>(&self, state: &S, generation: usize) -> Result<PathBuf> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let file = self
            .path
            .join(CHECKPOINTS_DIR)
            .join(format!("{timestamp}_{generation}.json"));
        let writer = BufWriter::new(File::create(&file)?);
        serde_json::to_writer_pretty(writer, state)?;
        debug!("Checkpoint saved in {}", file.display());
        Ok(file)
    }
}
