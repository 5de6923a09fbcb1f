//! Program Cache
//!
//! Owner of every [`Program`] of one GPU context. Programs live in a
//! contiguous `Vec` and are addressed through [`ProgramId`] handles.
//!
//! # Two-Level Caching (L1 / L2)
//!
//! | Level | Key | Value |
//! |-------|-----|-------|
//! | L1 | [`Fingerprint`] of the render state | `ProgramId` |
//! | L2 | xxh3-128 of vertex + fragment source | `ProgramId` |
//!
//! The L1 lookup runs on every draw. Only an L1 miss builds the graphs and
//! generates source; the L2 lookup then folds configurations that differ in
//! the fingerprint but produce identical text into one program, linked once.
//!
//! Index 0 always holds the sentinel program used for degenerate states.
//! Entries are never evicted.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::xxh3_128;

use crate::errors::{Result, ShaderGraphError};
use crate::graph::compiler::ShaderSource;
use crate::program::driver::GpuDriver;
use crate::program::program::Program;
use crate::state::fingerprint::Fingerprint;

/// Handle to a cached [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) u32);

impl ProgramId {
    /// The no-op program drawn for degenerate render states.
    pub const SENTINEL: Self = Self(0);

    /// Raw index into the program storage array.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Generated source pair memoized per fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSources {
    pub vertex: ShaderSource,
    pub fragment: ShaderSource,
}

impl ProgramSources {
    /// L2 key: both texts, length-prefixed so the split point is part of the hash.
    #[must_use]
    pub fn hash(&self) -> u128 {
        let vertex = self.vertex.text.as_bytes();
        let fragment = self.fragment.text.as_bytes();
        let mut bytes = Vec::with_capacity(8 + vertex.len() + fragment.len());
        bytes.extend_from_slice(&(vertex.len() as u64).to_le_bytes());
        bytes.extend_from_slice(vertex);
        bytes.extend_from_slice(fragment);
        xxh3_128(&bytes)
    }
}

pub struct ProgramCache {
    // ---- Storage (contiguous, indexed by Id) ----
    programs: Vec<Program>,

    // ---- L1 (fingerprint → Id) ----
    fingerprint_lookup: FxHashMap<Fingerprint, ProgramId>,

    // ---- L2 (source hash → Id) ----
    source_lookup: FxHashMap<u128, ProgramId>,

    // ---- Source memo ----
    sources: FxHashMap<Fingerprint, Arc<ProgramSources>>,
}

impl std::fmt::Debug for ProgramCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramCache")
            .field("programs", &self.program_count())
            .field("fingerprints", &self.fingerprint_count())
            .finish()
    }
}

impl Default for ProgramCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramCache {
    #[must_use]
    pub fn new() -> Self {
        let mut programs = Vec::with_capacity(32);
        programs.push(Program::sentinel());
        Self {
            programs,
            fingerprint_lookup: FxHashMap::default(),
            source_lookup: FxHashMap::default(),
            sources: FxHashMap::default(),
        }
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    #[must_use]
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<ProgramId> {
        self.fingerprint_lookup.get(fingerprint).copied()
    }

    pub fn get(&self, id: ProgramId) -> Result<&Program> {
        self.programs
            .get(id.index())
            .ok_or(ShaderGraphError::InvalidProgramId(id.0))
    }

    pub fn get_mut(&mut self, id: ProgramId) -> Result<&mut Program> {
        self.programs
            .get_mut(id.index())
            .ok_or(ShaderGraphError::InvalidProgramId(id.0))
    }

    /// Sources generated for a fingerprint, if it was compiled.
    #[must_use]
    pub fn sources(&self, fingerprint: &Fingerprint) -> Option<Arc<ProgramSources>> {
        self.sources.get(fingerprint).cloned()
    }

    // ── Insertion ────────────────────────────────────────────────────────────

    /// Maps a fingerprint to the sentinel program.
    pub fn insert_sentinel(&mut self, fingerprint: Fingerprint) -> ProgramId {
        self.fingerprint_lookup.insert(fingerprint, ProgramId::SENTINEL);
        ProgramId::SENTINEL
    }

    /// Stores generated sources for a fingerprint, sharing the program with
    /// any earlier fingerprint that produced the same text.
    pub fn insert(&mut self, fingerprint: Fingerprint, sources: ProgramSources) -> ProgramId {
        let hash = sources.hash();
        let id = match self.source_lookup.get(&hash) {
            Some(&id) => {
                log::debug!(
                    "fingerprint {fingerprint} shares program `{}`",
                    self.programs[id.index()].name()
                );
                id
            }
            None => {
                let id = ProgramId(self.programs.len() as u32);
                self.programs.push(Program::new(
                    sources.vertex.name.clone(),
                    sources.vertex.text.clone(),
                    sources.fragment.text.clone(),
                ));
                self.source_lookup.insert(hash, id);
                id
            }
        };

        self.fingerprint_lookup.insert(fingerprint, id);
        self.sources.insert(fingerprint, Arc::new(sources));
        id
    }

    // ── Context lifecycle ────────────────────────────────────────────────────

    /// Marks every program for rebuild after context loss.
    pub fn invalidate_all(&mut self) {
        for program in &mut self.programs {
            program.invalidate();
        }
    }

    /// Deletes every program's driver objects.
    pub fn release_all(&mut self, driver: &mut dyn GpuDriver) -> Result<()> {
        for program in &mut self.programs {
            program.release(driver)?;
        }
        Ok(())
    }

    /// Number of real programs, excluding the sentinel.
    #[must_use]
    pub fn program_count(&self) -> usize {
        self.programs.len() - 1
    }

    /// Number of fingerprints seen.
    #[must_use]
    pub fn fingerprint_count(&self) -> usize {
        self.fingerprint_lookup.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::context::Stage;

    fn sources(vertex: &str, fragment: &str) -> ProgramSources {
        ProgramSources {
            vertex: ShaderSource::from_text(Stage::Vertex, "test", vertex),
            fragment: ShaderSource::from_text(Stage::Fragment, "test", fragment),
        }
    }

    #[test]
    fn test_sentinel_is_first() {
        let cache = ProgramCache::new();
        assert!(cache.get(ProgramId::SENTINEL).unwrap().is_sentinel());
        assert_eq!(cache.program_count(), 0);
    }

    #[test]
    fn test_identical_sources_share_program() {
        let mut cache = ProgramCache::new();
        let a = cache.insert(Fingerprint(1), sources("void main() {}", "void main() {}"));
        let b = cache.insert(Fingerprint(2), sources("void main() {}", "void main() {}"));
        let c = cache.insert(Fingerprint(3), sources("void main() { }", "void main() {}"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(cache.program_count(), 2);
        assert_eq!(cache.fingerprint_count(), 3);
        assert_eq!(cache.lookup(&Fingerprint(2)), Some(a));
    }

    #[test]
    fn test_split_point_is_hashed() {
        assert_ne!(sources("ab", "c").hash(), sources("a", "bc").hash());
    }

    #[test]
    fn test_invalid_id() {
        let cache = ProgramCache::new();
        assert!(matches!(cache.get(ProgramId(7)), Err(ShaderGraphError::InvalidProgramId(7))));
    }
}
