//! Bounded archive of the best genomes seen across a run.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::schema::Genome;

/// One archived candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EliteEntry {
    /// The archived genome.
    pub genome: Genome,
    /// Score it earned when admitted.
    pub score: f32,
    /// Whether its evaluation included a victory.
    pub victory: bool,
    /// Generation it was admitted from.
    pub born_at_generation: usize,
}

/// Fixed-capacity ordered set of the best genomes, ordered by descending
/// score with ties going to the older entry.
///
/// The only mutation path is [`EliteArchive::merge_and_trim`], which keeps
/// the top-1 score monotonically non-decreasing across the life of a run:
/// a reigning entry is only displaced by a strictly or equally better one.
#[derive(Debug)]
pub struct EliteArchive {
    capacity: usize,
    entries: Vec<EliteEntry>,
}

impl EliteArchive {
    /// Empty archive holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Vec::new(),
        }
    }

    /// Maximum entries retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no generation has seeded the archive yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in rank order (best first).
    pub fn entries(&self) -> &[EliteEntry] {
        &self.entries
    }

    /// The better-scoring half of the archive (at least one entry when
    /// non-empty), used to seed heavy exploration.
    pub fn better_half(&self) -> &[EliteEntry] {
        &self.entries[..self.entries.len().div_ceil(2)]
    }

    /// Current best entry.
    pub fn champion(&self) -> Option<&EliteEntry> {
        self.entries.first()
    }

    /// Current best score.
    pub fn top_score(&self) -> Option<f32> {
        self.champion().map(|e| e.score)
    }

    /// Merge new candidates with the current entries and keep the top
    /// `capacity`, ordered `(score desc, born_at_generation asc)`.
    pub fn merge_and_trim(&mut self, candidates: Vec<EliteEntry>) {
        self.entries.extend(candidates);
        self.entries.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.born_at_generation.cmp(&b.born_at_generation))
        });
        self.entries.truncate(self.capacity);
    }

    /// Snapshot for export alongside the generation counter.
    pub fn checkpoint(&self, generation: usize) -> Checkpoint {
        Checkpoint {
            generation,
            entries: self.entries.clone(),
        }
    }

    /// Rebuild an archive from a checkpoint, re-trimming to `capacity`.
    pub fn from_checkpoint(capacity: usize, checkpoint: Checkpoint) -> Self {
        let mut archive = Self::new(capacity);
        archive.merge_and_trim(checkpoint.entries);
        archive
    }
}

/// Serialized archive plus generation counter; the whole of a run's
/// persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Generation counter at the time of the snapshot.
    pub generation: usize,
    /// Archive entries in rank order.
    pub entries: Vec<EliteEntry>,
}

impl Checkpoint {
    /// Write the checkpoint as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    /// Load a checkpoint from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Genome, TopologyDescriptor};

    fn entry(score: f32, born: usize) -> EliteEntry {
        EliteEntry {
            genome: Genome::zeros(&TopologyDescriptor {
                rows: 1,
                cols: 1,
                hidden: vec![2],
            }),
            score,
            victory: false,
            born_at_generation: born,
        }
    }

    #[test]
    fn merge_keeps_top_k() {
        let mut archive = EliteArchive::new(2);
        archive.merge_and_trim(vec![entry(10.0, 0), entry(5.0, 0)]);

        archive.merge_and_trim(vec![
            entry(20.0, 1),
            entry(1.0, 1),
            entry(1.0, 1),
            entry(1.0, 1),
            entry(1.0, 1),
            entry(1.0, 1),
        ]);

        assert_eq!(archive.len(), 2);
        assert_eq!(archive.entries()[0].score, 20.0);
        assert_eq!(archive.entries()[1].score, 10.0);
    }

    #[test]
    fn ties_prefer_older_entries() {
        let mut archive = EliteArchive::new(3);
        archive.merge_and_trim(vec![entry(7.0, 3)]);
        archive.merge_and_trim(vec![entry(7.0, 1), entry(7.0, 2)]);

        let born: Vec<usize> = archive
            .entries()
            .iter()
            .map(|e| e.born_at_generation)
            .collect();
        assert_eq!(born, vec![1, 2, 3]);
    }

    #[test]
    fn top_score_is_monotone_across_merges() {
        let mut archive = EliteArchive::new(3);
        let mut last_top = f32::NEG_INFINITY;
        let waves = [
            vec![entry(1.0, 0), entry(0.5, 0)],
            vec![entry(0.2, 1)],
            vec![entry(4.0, 2), entry(3.0, 2)],
            vec![entry(2.0, 3)],
        ];
        for wave in waves {
            archive.merge_and_trim(wave);
            let top = archive.top_score().expect("non-empty");
            assert!(top >= last_top);
            last_top = top;
        }
    }

    #[test]
    fn size_never_exceeds_capacity() {
        for capacity in 1..5 {
            let mut archive = EliteArchive::new(capacity);
            for generation in 0..10 {
                let wave = (0..7).map(|i| entry(i as f32, generation)).collect();
                archive.merge_and_trim(wave);
                assert!(archive.len() <= capacity);
            }
        }
    }

    #[test]
    fn better_half_rounds_up() {
        let mut archive = EliteArchive::new(5);
        archive.merge_and_trim((0..5).map(|i| entry(i as f32, 0)).collect());
        assert_eq!(archive.better_half().len(), 3);
        assert_eq!(archive.better_half()[0].score, 4.0);
    }

    #[test]
    fn checkpoint_roundtrip() {
        let mut archive = EliteArchive::new(2);
        archive.merge_and_trim(vec![entry(9.0, 4), entry(3.0, 4)]);

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("checkpoint.json");
        archive.checkpoint(5).save(&path).expect("save");

        let loaded = Checkpoint::load(&path).expect("load");
        assert_eq!(loaded.generation, 5);
        let restored = EliteArchive::from_checkpoint(2, loaded);
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.top_score(), Some(9.0));
    }
}
