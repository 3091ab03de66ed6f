//! Worker loops: one thread per CPU worker and per accelerator device.
//!
//! Every loop follows the same skeleton: check the stop flag, honor a
//! pending rekey request, produce one batch of candidates, run the
//! predicate, ship records, bump the counter. Nothing blocks inside an
//! iteration except the accelerator's batched retrieval, so the stop
//! flag is observed within one batch.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_channel::Sender;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::device::AcceleratorDevice;
use crate::group::{CandidateGroup, GeneratorTable, GroupWalker};
use crate::math::{public_key, Scalar};
use crate::predicate::Predicate;
use crate::record::{FoundRecord, WorkerId};
use crate::target::MatchTarget;

use crate::coordinator::SharedState;

/// A fresh cryptographically random scalar in [1, n).
pub fn random_scalar() -> Scalar {
    let mut bytes = [0u8; 32];
    loop {
        OsRng.fill_bytes(&mut bytes);
        let s = Scalar::from_bytes(&bytes);
        // Rejection sampling: accept only canonical nonzero values so
        // the distribution stays uniform.
        if !s.is_zero() && s.to_bytes() == bytes {
            return s;
        }
    }
}

/// Deterministic shard start: the worker index lands in bit 112 and the
/// device lane in bit 80, so no two workers ever meet within a sweep.
pub fn shard_key(base: &Scalar, worker: u32, lane: u32) -> Scalar {
    let offset = Scalar::new([0, ((worker as u64) << 48) | ((lane as u64) << 16), 0, 0]);
    base.add(&offset)
}

pub(crate) struct WorkerContext {
    pub id: WorkerId,
    /// Index into the shared per-worker slots.
    pub slot: usize,
    pub shared: Arc<SharedState>,
    pub records: Sender<FoundRecord>,
    pub target: Arc<MatchTarget>,
}

impl WorkerContext {
    #[inline]
    fn stopping(&self) -> bool {
        self.shared.stop.load(Ordering::Relaxed)
    }

    #[inline]
    fn rekey_requested(&self) -> bool {
        self.shared.rekey_flags[self.slot].swap(false, Ordering::Relaxed)
    }

    fn ship(&self, records: &mut Vec<FoundRecord>) -> bool {
        for record in records.drain(..) {
            if self.records.send(record).is_err() {
                // Coordinator gone; nothing left to report to.
                return false;
            }
        }
        true
    }
}

/// Synchronous CPU worker over the curve modes. Records are built
/// before the walker advances, so the base key in each record is the
/// one the batch was generated from by construction.
pub(crate) fn run_cpu_worker(ctx: WorkerContext, table: Arc<GeneratorTable>, start: Scalar) {
    let group_size = table.group_size();
    let predicate = Predicate::new(&ctx.target);
    let per_batch = group_size as u64 * predicate.candidates_per_point();

    let mut walker = GroupWalker::new(&table, start);
    let mut group = CandidateGroup::new(group_size);
    let mut hits: Vec<FoundRecord> = Vec::new();

    ctx.shared.mark_running(ctx.slot);

    while !ctx.stopping() {
        if ctx.rekey_requested() {
            walker.rekey(random_scalar());
        }

        walker.fill(&mut group);
        predicate.scan_group(ctx.id, &group, &mut hits);
        if !hits.is_empty() && !ctx.ship(&mut hits) {
            break;
        }
        ctx.shared.counters[ctx.slot].fetch_add(per_batch, Ordering::Relaxed);
    }

    ctx.shared.mark_exited(ctx.slot);
}

/// CPU worker for txid grinding: iterates a disjoint nonce shard, no
/// curve work at all.
pub(crate) fn run_txid_worker(ctx: WorkerContext, batch: u64) {
    let t = match &*ctx.target {
        MatchTarget::Txid(t) => t,
        _ => unreachable!("txid worker needs a txid target"),
    };
    let predicate = Predicate::new(&ctx.target);

    let bits = t.nonce_bits();
    let wrap = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
    // Worker index in the top bits of the nonce window.
    let shard_shift = bits.saturating_sub(8).min(63);
    let mut nonce = ((ctx.slot as u64) << shard_shift) & wrap;

    let mut scratch = t.raw_tx.clone();
    let mut hits: Vec<FoundRecord> = Vec::new();

    ctx.shared.mark_running(ctx.slot);

    while !ctx.stopping() {
        // Rekey in nonce space: jump to a random position.
        if ctx.rekey_requested() {
            let mut b = [0u8; 8];
            OsRng.fill_bytes(&mut b);
            nonce = u64::from_le_bytes(b) & wrap;
        }

        predicate.scan_nonces(ctx.id, nonce, batch, &mut scratch, &mut hits);
        nonce = nonce.wrapping_add(batch) & wrap;

        if !hits.is_empty() && !ctx.ship(&mut hits) {
            break;
        }
        ctx.shared.counters[ctx.slot].fetch_add(batch, Ordering::Relaxed);
    }

    ctx.shared.mark_exited(ctx.slot);
}

/// Accelerator worker. The device pipelines: `launch` returns the hits
/// of the batch submitted one call earlier, after this worker's keys
/// have already advanced. The keys active at submission time are kept
/// in `in_flight` and stamped into the records when the hits surface —
/// reconstruction must never see the advanced keys.
pub(crate) fn run_device_worker(
    ctx: WorkerContext,
    mut device: Box<dyn AcceleratorDevice>,
    start_keys: Vec<Scalar>,
) {
    let lanes = device.lanes();
    let group_size = device.group_size() as u64;
    let predicate = Predicate::new(&ctx.target);
    let per_launch = group_size * lanes as u64 * predicate.candidates_per_point();

    let mut keys = start_keys;
    let centers: Vec<_> = keys.iter().map(public_key).collect();
    if let Err(e) = device.set_keys(&centers) {
        eprintln!("[!] device {}: {}", device.name(), e);
        ctx.shared.mark_exited(ctx.slot);
        return;
    }

    let mut in_flight: Option<Vec<Scalar>> = None;
    let mut hits = Vec::new();
    let mut records: Vec<FoundRecord> = Vec::new();

    ctx.shared.mark_running(ctx.slot);

    while !ctx.stopping() {
        if ctx.rekey_requested() {
            for k in keys.iter_mut() {
                *k = random_scalar();
            }
            let centers: Vec<_> = keys.iter().map(public_key).collect();
            if let Err(e) = device.set_keys(&centers) {
                eprintln!("[!] device {}: {}", device.name(), e);
                break;
            }
            in_flight = None;
        }

        hits.clear();
        if let Err(e) = device.launch(&mut hits) {
            eprintln!("[!] device {}: {}", device.name(), e);
            break;
        }

        if let Some(launch_keys) = &in_flight {
            for hit in hits.drain(..) {
                records.push(FoundRecord {
                    worker: ctx.id,
                    base_key: launch_keys[hit.lane],
                    offset: hit.offset,
                    endo: hit.endo,
                    negated: hit.negated,
                    compressed: hit.compressed,
                    evidence: hit.evidence,
                });
            }
            if !records.is_empty() && !ctx.ship(&mut records) {
                break;
            }
        } else {
            debug_assert!(hits.is_empty(), "device produced hits with no batch in flight");
        }

        // Snapshot the keys the just-submitted batch was generated
        // from, then advance to mirror the device's internal walk.
        in_flight = Some(keys.clone());
        for k in keys.iter_mut() {
            *k = k.add(&Scalar::from_u64(group_size));
        }

        ctx.shared.counters[ctx.slot].fetch_add(per_launch, Ordering::Relaxed);
    }

    ctx.shared.mark_exited(ctx.slot);
}
