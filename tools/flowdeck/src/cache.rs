use std::collections::HashMap;

/// Last captured output line per (routine name, step index). Writes are
/// replace-only; the cache lives exactly as long as its presenter and needs
/// no eviction.
#[derive(Debug, Clone, Default)]
pub struct StepOutputCache {
    entries: HashMap<String, HashMap<usize, String>>,
}

impl StepOutputCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, routine: &str, index: usize, data: &str) {
        self.entries
            .entry(routine.to_string())
            .or_default()
            .insert(index, data.to_string());
    }

    pub fn get(&self, routine: &str, index: usize) -> Option<&str> {
        self.entries
            .get(routine)
            .and_then(|steps| steps.get(&index))
            .map(String::as_str)
    }
}
