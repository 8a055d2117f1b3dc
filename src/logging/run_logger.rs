use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use env_logger::{Env, Target, WriteStyle};
use log::{debug, info};

use crate::checkpoint::bundle::save_json;
use crate::error::Result;
use crate::model::state::{ParamCounts, StateDict};

pub const LOG_FILE: &str = "log.txt";
pub const BEST_MODEL_FILE: &str = "best_model.json";

/// The per-run log directory: text log, scalar stream and best model.
///
/// `initialize` installs the `env_logger` backend once per process; its
/// output goes to stderr and to `log.txt` in the run directory. A resumed run
/// reusing the directory appends to the earlier log.
pub struct RunLogger {
    dir: PathBuf,
}

impl RunLogger {
    pub fn initialize(dir: impl Into<PathBuf>) -> Result<RunLogger> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let file = OpenOptions::new().create(true).append(true).open(dir.join(LOG_FILE))?;

        let installed = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
            .target(Target::Pipe(Box::new(Tee { file, console: io::stderr() })))
            .write_style(WriteStyle::Never)
            .try_init();
        if installed.is_err() {
            debug!("logger already installed; {} will not receive text logs", dir.join(LOG_FILE).display());
        }

        Ok(RunLogger { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Logs run arguments as a two-column table.
    pub fn log_args(&self, entries: &[(&str, String)]) {
        info!(":=========== Few-shot Seg. with MSHNet ===========");
        for (key, value) in entries {
            info!("| {:>20}: {:<24}", key, value);
        }
        info!(":================================================");
    }

    pub fn log_params(&self, counts: ParamCounts) {
        info!("Backbone # param.: {}", counts.backbone);
        info!("Learnable # param.: {}", counts.learnable);
        info!("Total # param.: {}", counts.total());
    }

    /// Writes the best model so far into the run directory.
    pub fn save_model_miou(&self, state: &StateDict, epoch: usize, miou: f64) -> Result<PathBuf> {
        let path = self.dir.join(BEST_MODEL_FILE);
        save_json(&path, state)?;
        info!("Model saved @{} w/ val. mIoU: {:5.2}.", epoch, miou);
        Ok(path)
    }
}

/// Duplicates log output to the run's log file and the console.
struct Tee {
    file: File,
    console: io::Stderr,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        self.console.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.console.flush()
    }
}
