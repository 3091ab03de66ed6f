//! The search coordinator: worker lifecycle, the stop condition, rekey
//! cadence, verification of incoming records and result delivery.
//!
//! Workers never talk to each other. They share exactly three things,
//! all set-only during a run: the stop flag, the per-pattern found
//! flags and their own counters. Records flow through one bounded
//! channel into this module, which verifies each one before anything
//! reaches the caller. The result-reporting lock is created here,
//! before any worker thread exists.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError};
use fxhash::FxHashSet;
use parking_lot::Mutex;

use crate::device::{AcceleratorDevice, SoftwareDevice};
use crate::error::{EngineError, Result};
use crate::group::{GeneratorTable, DEFAULT_GROUP_SIZE};
use crate::math::Scalar;
use crate::reconstruct::{FoundKey, FoundPayload, Reconstructor};
use crate::record::{FoundRecord, WorkerId, DEVICE_WORKER_BASE};
use crate::stats::{Progress, RateFilter};
use crate::target::MatchTarget;
use crate::worker::{self, random_scalar, shard_key, WorkerContext};

const PHASE_IDLE: u8 = 0;
const PHASE_RUNNING: u8 = 1;
const PHASE_EXITED: u8 = 2;

/// State shared between the coordinator and every worker.
pub(crate) struct SharedState {
    pub stop: AtomicBool,
    pub found_flags: Vec<AtomicBool>,
    pub counters: Vec<AtomicU64>,
    pub rekey_flags: Vec<AtomicBool>,
    phases: Vec<AtomicU8>,
    pub found_count: AtomicU64,
    /// Candidates tested at the moment the stop flag was first set;
    /// u64::MAX until then. Lets callers bound post-stop work.
    stop_snapshot: AtomicU64,
}

impl SharedState {
    fn new(workers: usize, patterns: usize) -> Self {
        Self {
            stop: AtomicBool::new(false),
            found_flags: (0..patterns).map(|_| AtomicBool::new(false)).collect(),
            counters: (0..workers).map(|_| AtomicU64::new(0)).collect(),
            rekey_flags: (0..workers).map(|_| AtomicBool::new(false)).collect(),
            phases: (0..workers).map(|_| AtomicU8::new(PHASE_IDLE)).collect(),
            found_count: AtomicU64::new(0),
            stop_snapshot: AtomicU64::new(u64::MAX),
        }
    }

    pub fn mark_running(&self, slot: usize) {
        self.phases[slot].store(PHASE_RUNNING, Ordering::Release);
    }

    pub fn mark_exited(&self, slot: usize) {
        self.phases[slot].store(PHASE_EXITED, Ordering::Release);
    }

    pub fn total_tested(&self) -> u64 {
        self.counters.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    fn all_exited(&self) -> bool {
        self.phases
            .iter()
            .all(|p| p.load(Ordering::Acquire) == PHASE_EXITED)
    }

    fn all_found(&self) -> bool {
        self.found_flags
            .iter()
            .all(|f| f.load(Ordering::Relaxed))
    }

    /// Set-only stop, snapshotting the counter total exactly once.
    fn trigger_stop(&self) {
        let tested = self.total_tested();
        let _ = self.stop_snapshot.compare_exchange(
            u64::MAX,
            tested,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        self.stop.store(true, Ordering::SeqCst);
    }

    fn request_rekey_all(&self) {
        for flag in &self.rekey_flags {
            flag.store(true, Ordering::Relaxed);
        }
    }
}

/// Engine configuration beyond the match target itself.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// CPU worker threads; 0 is valid when devices are configured.
    pub cpu_workers: usize,
    /// Software accelerator devices to spawn (one thread each).
    pub software_devices: usize,
    /// Parallel lanes per software device.
    pub device_lanes: usize,
    pub group_size: usize,
    /// Stop once every pattern has a verified result.
    pub stop_when_found: bool,
    /// Re-randomize every worker's base key after this many million
    /// candidates; 0 disables. Nonzero also randomizes start keys.
    pub rekey_mkeys: u64,
    /// Deterministic base key (big-endian); None draws a random one.
    pub start_key: Option<[u8; 32]>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cpu_workers: 1,
            software_devices: 0,
            device_lanes: 4,
            group_size: DEFAULT_GROUP_SIZE,
            stop_when_found: true,
            rekey_mkeys: 0,
            start_key: None,
        }
    }
}

/// A configured search, ready to run.
pub struct SearchEngine {
    target: Arc<MatchTarget>,
    table: Arc<GeneratorTable>,
    config: SearchConfig,
    shared: Arc<SharedState>,
    devices: Mutex<Vec<Box<dyn AcceleratorDevice>>>,
    /// Serializes multi-step result reporting; exists before any worker.
    report_lock: Arc<Mutex<()>>,
    started_at: Mutex<Option<Instant>>,
    rate_bits: AtomicU64,
}

impl SearchEngine {
    pub fn new(target: MatchTarget, config: SearchConfig) -> Result<Self> {
        if config.group_size < 4 || config.group_size % 2 != 0 || config.group_size > (1 << 20) {
            return Err(EngineError::Config(format!(
                "group size {} must be even, 4..=1048576",
                config.group_size
            )));
        }
        if config.cpu_workers == 0 && config.software_devices == 0 {
            return Err(EngineError::Config("no workers configured".into()));
        }
        if !target.is_ec_mode() && config.software_devices > 0 {
            return Err(EngineError::Config(
                "txid grinding runs on CPU workers only".into(),
            ));
        }
        if config.software_devices > 0 && config.device_lanes == 0 {
            return Err(EngineError::Config("device lanes must be nonzero".into()));
        }
        if let Some(bytes) = &config.start_key {
            let s = Scalar::from_bytes(bytes);
            if s.is_zero() || s.to_bytes() != *bytes {
                return Err(EngineError::Config(
                    "start key must be a nonzero scalar below the curve order".into(),
                ));
            }
        }

        let target = Arc::new(target);
        let table = Arc::new(GeneratorTable::new(config.group_size));

        let mut devices: Vec<Box<dyn AcceleratorDevice>> = Vec::new();
        for _ in 0..config.software_devices {
            devices.push(Box::new(SoftwareDevice::new(
                Arc::clone(&target),
                Arc::clone(&table),
                config.device_lanes,
            )?));
        }

        let workers = config.cpu_workers + config.software_devices;
        let shared = Arc::new(SharedState::new(workers, target.pattern_count()));

        Ok(Self {
            target,
            table,
            config,
            shared,
            devices: Mutex::new(devices),
            report_lock: Arc::new(Mutex::new(())),
            started_at: Mutex::new(None),
            rate_bits: AtomicU64::new(0f64.to_bits()),
        })
    }

    pub fn target(&self) -> &MatchTarget {
        &self.target
    }

    /// Cooperative stop; workers observe it within one batch.
    pub fn request_stop(&self) {
        self.shared.trigger_stop();
    }

    /// Candidates tested when the stop flag was set, if it has been.
    pub fn tested_at_stop(&self) -> Option<u64> {
        match self.shared.stop_snapshot.load(Ordering::SeqCst) {
            u64::MAX => None,
            v => Some(v),
        }
    }

    /// Thread-safe progress snapshot.
    pub fn progress(&self) -> Progress {
        let elapsed = self
            .started_at
            .lock()
            .map(|t| t.elapsed())
            .unwrap_or_default();
        Progress {
            tested: self.shared.total_tested(),
            found: self.shared.found_count.load(Ordering::Relaxed),
            patterns_found: self
                .shared
                .found_flags
                .iter()
                .map(|f| f.load(Ordering::Relaxed))
                .collect(),
            elapsed,
            rate: f64::from_bits(self.rate_bits.load(Ordering::Relaxed)),
            difficulty: self.target.difficulty(),
        }
    }

    /// Drive the search to completion, delivering each verified result
    /// to `sink`. Blocks until the stop condition is met and every
    /// worker has exited.
    pub fn run_with<F>(&self, mut sink: F) -> Result<Progress>
    where
        F: FnMut(FoundKey),
    {
        *self.started_at.lock() = Some(Instant::now());

        let randomize = self.config.rekey_mkeys > 0;
        let base = match &self.config.start_key {
            Some(bytes) => Scalar::from_bytes(bytes),
            None => random_scalar(),
        };

        let (tx, rx) = bounded::<FoundRecord>(4096);
        let mut handles = Vec::new();
        let mut slot = 0usize;

        // CPU workers.
        for i in 0..self.config.cpu_workers {
            let ctx = WorkerContext {
                id: i as WorkerId,
                slot,
                shared: Arc::clone(&self.shared),
                records: tx.clone(),
                target: Arc::clone(&self.target),
            };
            let handle = if self.target.is_ec_mode() {
                let table = Arc::clone(&self.table);
                let start = if randomize {
                    random_scalar()
                } else {
                    shard_key(&base, i as u32, 0)
                };
                thread::Builder::new()
                    .name(format!("worker-{}", i))
                    .spawn(move || worker::run_cpu_worker(ctx, table, start))
            } else {
                let batch = self.config.group_size as u64;
                thread::Builder::new()
                    .name(format!("worker-{}", i))
                    .spawn(move || worker::run_txid_worker(ctx, batch))
            };
            handles.push(handle.map_err(|e| EngineError::Device(e.to_string()))?);
            slot += 1;
        }

        // Accelerator workers, one thread per device. A device that
        // fails at startup logs and exits inside its own thread; the
        // rest of the run is unaffected.
        let devices: Vec<_> = self.devices.lock().drain(..).collect();
        for (i, device) in devices.into_iter().enumerate() {
            let id = DEVICE_WORKER_BASE + i as WorkerId;
            let ctx = WorkerContext {
                id,
                slot,
                shared: Arc::clone(&self.shared),
                records: tx.clone(),
                target: Arc::clone(&self.target),
            };
            let start_keys: Vec<Scalar> = (0..device.lanes())
                .map(|lane| {
                    if randomize {
                        random_scalar()
                    } else {
                        shard_key(&base, id, lane as u32)
                    }
                })
                .collect();
            let handle = thread::Builder::new()
                .name(format!("device-{}", i))
                .spawn(move || worker::run_device_worker(ctx, device, start_keys))
                .map_err(|e| EngineError::Device(e.to_string()))?;
            handles.push(handle);
            slot += 1;
        }
        drop(tx);

        self.consume(rx, &mut sink);

        for handle in handles {
            let _ = handle.join();
        }
        Ok(self.progress())
    }

    /// The consumer loop: verify records, deliver results, manage the
    /// stop condition and the rekey cadence.
    fn consume<F>(&self, rx: crossbeam_channel::Receiver<FoundRecord>, sink: &mut F)
    where
        F: FnMut(FoundKey),
    {
        let reconstructor = Reconstructor::new(&self.target);
        let mut delivered: FxHashSet<[u8; 32]> = FxHashSet::default();
        let mut filter = RateFilter::new();
        let mut last_tick = Instant::now();
        let mut last_tested = 0u64;
        let mut last_rekey = 0u64;

        loop {
            match rx.recv_timeout(Duration::from_millis(50)) {
                Ok(record) => self.process_record(&reconstructor, record, &mut delivered, sink),
                Err(RecvTimeoutError::Timeout) => {}
                // Every worker has exited and the queue is drained.
                Err(RecvTimeoutError::Disconnected) => break,
            }

            let tick = last_tick.elapsed();
            if tick >= Duration::from_millis(500) {
                let tested = self.shared.total_tested();
                let rate = (tested - last_tested) as f64 / tick.as_secs_f64();
                let smoothed = filter.push(rate);
                self.rate_bits.store(smoothed.to_bits(), Ordering::Relaxed);
                last_tested = tested;
                last_tick = Instant::now();

                if self.config.rekey_mkeys > 0
                    && tested - last_rekey > self.config.rekey_mkeys * 1_000_000
                {
                    self.shared.request_rekey_all();
                    last_rekey = tested;
                }
            }

            if self.shared.stop.load(Ordering::Relaxed) && self.shared.all_exited() {
                // Drain anything still queued before leaving.
                while let Ok(record) = rx.try_recv() {
                    self.process_record(&reconstructor, record, &mut delivered, sink);
                }
                break;
            }
        }
    }

    fn process_record<F>(
        &self,
        reconstructor: &Reconstructor<'_>,
        record: FoundRecord,
        delivered: &mut FxHashSet<[u8; 32]>,
        sink: &mut F,
    ) where
        F: FnMut(FoundKey),
    {
        // Once the stop condition is satisfied, queued records are
        // redundant work product; skip the expensive verification.
        if self.config.stop_when_found && self.shared.all_found() {
            return;
        }

        let pattern_index = record.pattern_index();
        match reconstructor.process(&record) {
            Ok(found) => {
                let dedup_key = match (&found.private_key, &found.payload) {
                    (Some(k), _) => k.to_bytes(),
                    (None, FoundPayload::Transaction { nonce, .. }) => {
                        let mut b = [0u8; 32];
                        b[..8].copy_from_slice(&nonce.to_le_bytes());
                        b
                    }
                    (None, _) => [0u8; 32],
                };
                if !delivered.insert(dedup_key) {
                    return;
                }

                self.shared.found_count.fetch_add(1, Ordering::Relaxed);
                if let Some(flag) = self.shared.found_flags.get(pattern_index) {
                    flag.store(true, Ordering::Relaxed);
                }

                {
                    // Result delivery is multi-step I/O on the caller's
                    // side; keep it serialized.
                    let _guard = self.report_lock.lock();
                    sink(found);
                }

                if self.config.stop_when_found && self.shared.all_found() {
                    self.shared.trigger_stop();
                }
            }
            Err(EngineError::Verification {
                worker,
                offset,
                endo,
                negated,
            }) => {
                // Integrity failure: never deliver, never stop. Full
                // diagnostics so the defect is traceable.
                eprintln!(
                    "[!] verification failed: worker {} offset {} endo {} negated {} — record dropped",
                    worker, offset, endo, negated
                );
            }
            Err(e) => {
                eprintln!("[!] record rejected: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Mask256;

    fn mask_target() -> MatchTarget {
        MatchTarget::Mask(Mask256::from_hex("DEADBEEF", None).unwrap())
    }

    #[test]
    fn rejects_empty_worker_set() {
        let cfg = SearchConfig {
            cpu_workers: 0,
            software_devices: 0,
            ..Default::default()
        };
        assert!(SearchEngine::new(mask_target(), cfg).is_err());
    }

    #[test]
    fn rejects_odd_group_size() {
        let cfg = SearchConfig {
            group_size: 1023,
            ..Default::default()
        };
        assert!(SearchEngine::new(mask_target(), cfg).is_err());
    }

    #[test]
    fn rejects_devices_for_txid() {
        use crate::target::TxidTarget;
        let t = MatchTarget::Txid(
            TxidTarget::new(vec![0u8; 59], 10, 4, Mask256::from_hex("0000", None).unwrap())
                .unwrap(),
        );
        let cfg = SearchConfig {
            software_devices: 1,
            ..Default::default()
        };
        assert!(SearchEngine::new(t, cfg).is_err());
    }

    #[test]
    fn rejects_out_of_range_start_key() {
        let cfg = SearchConfig {
            start_key: Some([0xFF; 32]),
            ..Default::default()
        };
        assert!(SearchEngine::new(mask_target(), cfg).is_err());
        let cfg = SearchConfig {
            start_key: Some([0x00; 32]),
            ..Default::default()
        };
        assert!(SearchEngine::new(mask_target(), cfg).is_err());
    }

    #[test]
    fn stop_snapshot_set_once() {
        let engine = SearchEngine::new(mask_target(), SearchConfig::default()).unwrap();
        assert_eq!(engine.tested_at_stop(), None);
        engine.request_stop();
        assert_eq!(engine.tested_at_stop(), Some(0));
        engine.shared.counters[0].store(999, Ordering::Relaxed);
        engine.request_stop();
        assert_eq!(engine.tested_at_stop(), Some(0), "snapshot must not move");
    }
}
