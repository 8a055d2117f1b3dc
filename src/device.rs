use std::fmt;

use log::info;

/// Compute device batches are relocated to before the forward pass.
///
/// Only the CPU is implemented; accelerator requests resolve to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
}

impl Device {
    /// Picks the best available device and logs what was found.
    pub fn detect() -> Device {
        let gpus = Device::accelerator_count();
        info!("# available GPUs: {}", gpus);
        if gpus == 0 {
            info!("no accelerator available, falling back to {}", Device::Cpu);
        }
        Device::Cpu
    }

    /// Number of accelerators this build can drive.
    pub fn accelerator_count() -> usize {
        0
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
        }
    }
}
