//! Accelerator device abstraction.
//!
//! A device owns per-lane curve state as *points only* — the scalars
//! stay with the worker thread that drives it. The launch contract is
//! pipelined: `launch` queues computation of the current batch and
//! returns the hits of the *previous* one, so results come back one
//! batch late while the worker's visible keys have already advanced.
//! Workers therefore snapshot their lane keys at submission time and
//! pair retrieved hits with that snapshot (see the worker loop); a
//! device never needs to know a private key.
//!
//! `SoftwareDevice` is the CPU-backed reference implementation with the
//! same latency behavior a real accelerator exhibits.

use crate::error::{EngineError, Result};
use crate::group::{CandidateGroup, GeneratorTable, GroupWalker};
use crate::math::{Point, Scalar};
use crate::predicate::Predicate;
use crate::record::{Endo, Evidence};
use crate::target::MatchTarget;

/// A hit as a device reports it: lane-relative, no key material.
#[derive(Clone, Debug)]
pub struct DeviceHit {
    pub lane: usize,
    pub offset: i64,
    pub endo: Endo,
    pub negated: bool,
    pub compressed: bool,
    pub evidence: Evidence,
}

pub trait AcceleratorDevice: Send {
    fn name(&self) -> String;

    /// Independent base keys this device walks in parallel.
    fn lanes(&self) -> usize;

    fn group_size(&self) -> usize;

    /// Install fresh per-lane center points and drop any batch still in
    /// flight.
    fn set_keys(&mut self, centers: &[Point]) -> Result<()>;

    /// Queue the next batch and append the previous batch's hits to
    /// `out`. The first call after `set_keys` yields no hits.
    fn launch(&mut self, out: &mut Vec<DeviceHit>) -> Result<()>;
}

/// CPU-backed device: computes batches synchronously but buffers the
/// results for one call to reproduce the accelerator retrieval latency.
pub struct SoftwareDevice {
    target: std::sync::Arc<MatchTarget>,
    table: std::sync::Arc<GeneratorTable>,
    lanes: usize,
    centers: Vec<Point>,
    group: CandidateGroup,
    pending: Option<Vec<DeviceHit>>,
}

impl SoftwareDevice {
    pub fn new(
        target: std::sync::Arc<MatchTarget>,
        table: std::sync::Arc<GeneratorTable>,
        lanes: usize,
    ) -> Result<Self> {
        if !target.is_ec_mode() {
            return Err(EngineError::Device(
                "txid grinding runs on CPU workers, not devices".into(),
            ));
        }
        if lanes == 0 {
            return Err(EngineError::Device("device needs at least one lane".into()));
        }
        let group_size = table.group_size();
        Ok(Self {
            target,
            table,
            lanes,
            centers: Vec::with_capacity(lanes),
            group: CandidateGroup::new(group_size),
            pending: None,
        })
    }
}

impl AcceleratorDevice for SoftwareDevice {
    fn name(&self) -> String {
        format!("software ({} lanes)", self.lanes)
    }

    fn lanes(&self) -> usize {
        self.lanes
    }

    fn group_size(&self) -> usize {
        self.table.group_size()
    }

    fn set_keys(&mut self, centers: &[Point]) -> Result<()> {
        if centers.len() != self.lanes {
            return Err(EngineError::Device(format!(
                "expected {} lane keys, got {}",
                self.lanes,
                centers.len()
            )));
        }
        self.centers.clear();
        self.centers.extend_from_slice(centers);
        self.pending = None;
        Ok(())
    }

    fn launch(&mut self, out: &mut Vec<DeviceHit>) -> Result<()> {
        if self.centers.is_empty() {
            return Err(EngineError::Device("launch before set_keys".into()));
        }

        let predicate = Predicate::new(&self.target);
        let mut batch_hits = Vec::new();
        let mut records = Vec::new();

        for lane in 0..self.centers.len() {
            // The walker only needs the point; lane keys live with the
            // caller, so the scalar slot is a placeholder and records
            // are read back lane-relative.
            let mut walker =
                GroupWalker::with_center(&self.table, Scalar::ZERO, self.centers[lane]);
            records.clear();
            walker.fill(&mut self.group);
            predicate.scan_group(lane as u32, &self.group, &mut records);
            self.centers[lane] = walker.center();

            batch_hits.extend(records.drain(..).map(|r| DeviceHit {
                lane,
                offset: r.offset,
                endo: r.endo,
                negated: r.negated,
                compressed: r.compressed,
                evidence: r.evidence,
            }));
        }

        // Hand back the previous batch, keep this one in flight.
        if let Some(prev) = self.pending.replace(batch_hits) {
            out.extend(prev);
        }
        Ok(())
    }
}
