//! Engine parameters for a mapreduce process. These tune how a job is executed and never
//! reach the user's map/reduce functions (see `parameter_set` for those).
//!

use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct MRParameters {
    pub mappers: usize,
    pub reducers: usize,

    pub map_partition_size: usize,
    pub spill_buffer_size: usize,

    pub reduce_output_shard_prefix: String,

    pub scratch_dir: Option<PathBuf>,
    pub keep_temp_files: bool,
    pub overwrite_output: bool,
    pub timeout_ms: Option<u64>,

    // Internal parameters
    #[serde(skip)]
    pub shard_id: usize,
}

impl Default for MRParameters {
    fn default() -> MRParameters {
        MRParameters {
            mappers: 4,
            reducers: 4,
            map_partition_size: 64 * 1024 * 1024,
            spill_buffer_size: 16 * 1024 * 1024,
            reduce_output_shard_prefix: String::from("part-"),
            scratch_dir: None,
            keep_temp_files: false,
            overwrite_output: false,
            timeout_ms: None,
            shard_id: 0,
        }
    }
}

impl MRParameters {
    pub fn new() -> MRParameters {
        MRParameters::default()
    }

    /// Determines how many parallel tasks will be run. Mappers and reducers do in general
    /// not run at the same time (as the reducers need to wait for the map output). The number of
    /// reducers also determines the partitioning of the map output data and the number of output
    /// files.
    ///
    /// Default 4/4
    pub fn set_concurrency(mut self, mappers: usize, reducers: usize) -> MRParameters {
        self.mappers = mappers.max(1);
        self.reducers = reducers.max(1);
        self
    }

    /// This parameter determines the size of the chunks that the input is partitioned in
    /// before being processed by map tasks. All input data of one chunk will be in memory.
    ///
    /// Default 64 MiB
    pub fn set_partition_size(mut self, size: usize) -> MRParameters {
        self.map_partition_size = size.max(1);
        self
    }

    /// How many bytes of map output a map task buffers before it sorts them and writes them out
    /// as a run file. Small values produce many runs, all of which are merged by the reducers.
    ///
    /// Default 16 MiB
    pub fn set_spill_size(mut self, size: usize) -> MRParameters {
        self.spill_buffer_size = size.max(1);
        self
    }

    /// Prefix for output files produced by the reduce phase.
    /// Default: part- (the zero-padded id of the reduce shard will be appended to that string)
    pub fn set_out_name(mut self, prefix: &str) -> MRParameters {
        self.reduce_output_shard_prefix = prefix.to_string();
        self
    }

    /// Directory for intermediate map output. Default: the system temp directory.
    pub fn set_scratch_dir(mut self, dir: impl Into<PathBuf>) -> MRParameters {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn set_keep_temp_files(mut self, keep: bool) -> MRParameters {
        self.keep_temp_files = keep;
        self
    }

    /// Whether a job may replace an existing output. Default: false (the job is rejected).
    pub fn set_overwrite(mut self, overwrite: bool) -> MRParameters {
        self.overwrite_output = overwrite;
        self
    }

    /// Wall-clock limit for a whole job. Default: none.
    pub fn set_timeout(mut self, t: Duration) -> MRParameters {
        self.timeout_ms = Some((t.as_millis() as u64).max(1));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn scratch_location(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// For internal use: Sets the ID of the executing data chunk (for file naming etc.)
    ///
    pub fn set_shard_id(mut self, n: usize) -> MRParameters {
        self.shard_id = n;
        self
    }
}
