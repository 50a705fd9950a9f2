use super::thread_override;

/// Settings shared by every effect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlobalControls {
    pub num_threads: Option<i64>,
}

/// Global worker count. `None` means "use the machine's parallelism".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlobalParams {
    pub threads: Option<u32>,
}

impl GlobalParams {
    pub fn from_controls(c: &GlobalControls) -> Self {
        Self {
            threads: thread_override(c.num_threads),
        }
    }

    pub fn controls(&self) -> GlobalControls {
        GlobalControls {
            num_threads: self.threads.map(i64::from),
        }
    }
}
