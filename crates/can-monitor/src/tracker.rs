//! Per-ID payload change tracking

use elm_can::CanFrame;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// A payload that differs from the last one seen for the same ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub id: u32,
    pub previous: Vec<u8>,
    pub current: Vec<u8>,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03x}: ", self.id)?;
        write_hex(f, &self.previous)?;
        f.write_str(" -> ")?;
        write_hex(f, &self.current)
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for byte in bytes {
        write!(f, "{:02x}", byte)?;
    }
    Ok(())
}

/// Remembers the last payload of every ID and reports changes
pub struct ChangeTracker {
    last: HashMap<u32, Vec<u8>>,
    ignore: HashSet<u32>,
    /// Report every frame after the first, changed or not
    firehose: bool,
}

impl ChangeTracker {
    pub fn new(ignore: impl IntoIterator<Item = u32>, firehose: bool) -> Self {
        let ignore: HashSet<u32> = ignore.into_iter().collect();
        debug!("Tracking changes, ignoring {} IDs, firehose {}", ignore.len(), firehose);
        Self {
            last: HashMap::new(),
            ignore,
            firehose,
        }
    }

    /// Record `frame`. The first frame of an ID is remembered silently;
    /// empty payloads and ignored IDs are skipped.
    pub fn observe(&mut self, frame: &CanFrame) -> Option<Change> {
        if frame.payload.is_empty() || self.ignore.contains(&frame.id) {
            return None;
        }

        match self.last.get_mut(&frame.id) {
            None => {
                self.last.insert(frame.id, frame.payload.clone());
                None
            }
            Some(previous) if self.firehose || *previous != frame.payload => {
                let previous = std::mem::replace(previous, frame.payload.clone());
                Some(Change {
                    id: frame.id,
                    previous,
                    current: frame.payload.clone(),
                })
            }
            Some(_) => None,
        }
    }

    /// Number of distinct IDs seen so far
    pub fn id_count(&self) -> usize {
        self.last.len()
    }
}
