//! Config-file parsing (§6/§10): the simulator's own line-oriented
//! grammar, not `vmsim-core`'s concern (it only ever sees an
//! already-validated `KernelConfig`).
//!
//! Grounded in the teacher's config-loading shape (`crates/daemon/src/
//! config.rs` reads a file into a typed struct and returns a typed error
//! rather than panicking) adapted to this grammar's actual source,
//! `original_source/src/os.c`'s `read_config`: three header lines
//! (`time_slot num_cpus num_processes`, then `ram_size swap0..swap3`),
//! followed by one `start_time program_path priority` line per process.

use std::path::{Path, PathBuf};

use thiserror::Error;

use vmsim_core::kernel::KernelConfig;
use vmsim_core::pte::PAGING_MAX_MMSWP;
use vmsim_core::scheduler::MAX_PRIO;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("line {line}: expected {expected}, found {found:?}")]
    Malformed { line: usize, expected: &'static str, found: String },

    #[error("line {line}: process count does not match num_processes ({declared} declared, {actual} found)")]
    ProcessCountMismatch { line: usize, declared: usize, actual: usize },

    #[error("ram_size must be non-zero")]
    ZeroRam,

    #[error("num_cpus must be at least 1")]
    ZeroCpus,

    #[error("at least one swap device must have a non-zero size")]
    NoSwapConfigured,

    #[error("process {index} has priority {priority}, must be < {max}")]
    PriorityOutOfRange { index: usize, priority: usize, max: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessEntry {
    pub start_time: u64,
    pub program_path: PathBuf,
    pub priority: usize,
}

#[derive(Clone, Debug)]
pub struct SimConfig {
    pub time_slot: u32,
    pub num_cpus: usize,
    pub num_processes: usize,
    pub ram_size: usize,
    pub swap_sizes: [usize; PAGING_MAX_MMSWP],
    pub processes: Vec<ProcessEntry>,
}

impl SimConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Unreadable { path: path.display().to_string(), reason: e.to_string() })?;
        Self::parse(&text)
    }

    /// Parse the grammar from an in-memory string. Blank lines and lines
    /// starting with `#` are skipped before the grammar's fixed line
    /// positions are counted, so a commented config file and its
    /// comment-free equivalent parse identically.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut meaningful = text
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

        let (header_line, header) = meaningful
            .next()
            .ok_or(ConfigError::Malformed { line: 1, expected: "time_slot num_cpus num_processes", found: String::new() })?;
        let header_fields: Vec<&str> = header.split_whitespace().collect();
        if header_fields.len() != 3 {
            return Err(ConfigError::Malformed {
                line: header_line,
                expected: "time_slot num_cpus num_processes",
                found: header.to_string(),
            });
        }
        let time_slot = parse_field(header_line, "time_slot", header_fields[0])?;
        let num_cpus: usize = parse_field(header_line, "num_cpus", header_fields[1])?;
        let num_processes: usize = parse_field(header_line, "num_processes", header_fields[2])?;

        let (mem_line, mem) = meaningful
            .next()
            .ok_or(ConfigError::Malformed { line: header_line + 1, expected: "ram_size swap0..swap3", found: String::new() })?;
        let mem_fields: Vec<&str> = mem.split_whitespace().collect();
        if mem_fields.len() != 1 + PAGING_MAX_MMSWP {
            return Err(ConfigError::Malformed {
                line: mem_line,
                expected: "ram_size swap0 swap1 swap2 swap3",
                found: mem.to_string(),
            });
        }
        let ram_size: usize = parse_field(mem_line, "ram_size", mem_fields[0])?;
        let mut swap_sizes = [0usize; PAGING_MAX_MMSWP];
        for (slot, field) in swap_sizes.iter_mut().zip(&mem_fields[1..]) {
            *slot = parse_field(mem_line, "swap size", field)?;
        }

        let mut processes = Vec::with_capacity(num_processes);
        for (line_no, line) in meaningful {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 3 {
                return Err(ConfigError::Malformed {
                    line: line_no,
                    expected: "start_time program_path priority",
                    found: line.to_string(),
                });
            }
            let start_time: u64 = parse_field(line_no, "start_time", fields[0])?;
            let priority: usize = parse_field(line_no, "priority", fields[2])?;
            processes.push(ProcessEntry {
                start_time,
                program_path: Path::new("input/proc").join(fields[1]),
                priority,
            });
        }

        if processes.len() != num_processes {
            return Err(ConfigError::ProcessCountMismatch {
                line: mem_line,
                declared: num_processes,
                actual: processes.len(),
            });
        }

        let config = Self { time_slot, num_cpus, num_processes, ram_size, swap_sizes, processes };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ram_size == 0 {
            return Err(ConfigError::ZeroRam);
        }
        if self.num_cpus == 0 {
            return Err(ConfigError::ZeroCpus);
        }
        if self.swap_sizes.iter().all(|&s| s == 0) {
            return Err(ConfigError::NoSwapConfigured);
        }
        for (index, proc) in self.processes.iter().enumerate() {
            if proc.priority >= MAX_PRIO {
                return Err(ConfigError::PriorityOutOfRange { index, priority: proc.priority, max: MAX_PRIO });
            }
        }
        Ok(())
    }

    pub fn to_kernel_config(&self) -> KernelConfig {
        let mut config = KernelConfig::default();
        config.ram_size = self.ram_size;
        config.swap_sizes = self.swap_sizes;
        config.num_cpus = self.num_cpus;
        config
    }
}

fn parse_field<T: std::str::FromStr>(line: usize, expected: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Malformed { line, expected, found: raw.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "\
# time_slot num_cpus num_processes
100 2 2

1024 512 0 0 0
0 p0.txt 0
5 p1.txt 3
";

    #[test]
    fn parses_a_well_formed_config() {
        let config = SimConfig::parse(VALID).unwrap();
        assert_eq!(config.time_slot, 100);
        assert_eq!(config.num_cpus, 2);
        assert_eq!(config.processes.len(), 2);
        assert_eq!(config.processes[0].program_path, Path::new("input/proc/p0.txt"));
        assert_eq!(config.processes[1].priority, 3);
    }

    #[test]
    fn rejects_zero_ram() {
        let text = "1 1 0\n0 0 0 0 0\n";
        assert_eq!(SimConfig::parse(text).unwrap_err(), ConfigError::ZeroRam);
    }

    #[test]
    fn rejects_mismatched_process_count() {
        let text = "1 1 2\n1024 512 0 0 0\n0 p0.txt 0\n";
        assert!(matches!(SimConfig::parse(text).unwrap_err(), ConfigError::ProcessCountMismatch { .. }));
    }

    #[test]
    fn rejects_priority_at_or_above_max_prio() {
        let text = "1 1 1\n1024 512 0 0 0\n0 p0.txt 8\n";
        assert!(matches!(SimConfig::parse(text).unwrap_err(), ConfigError::PriorityOutOfRange { .. }));
    }

    #[test]
    fn comments_and_blank_lines_do_not_change_the_grammar() {
        let with_comments = VALID;
        let without_comments = "100 2 2\n1024 512 0 0 0\n0 p0.txt 0\n5 p1.txt 3\n";
        let a = SimConfig::parse(with_comments).unwrap();
        let b = SimConfig::parse(without_comments).unwrap();
        assert_eq!(a.time_slot, b.time_slot);
        assert_eq!(a.processes, b.processes);
    }
}
