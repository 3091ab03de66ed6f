//! Coordinator-level behavior: wildcard matching, key modes,
//! multi-pattern stop semantics and progress reporting.

use obscurity::address::{hash160_to_address, AddressKind};
use obscurity::hashing::hash160;
use obscurity::math::{public_key, Scalar};
use obscurity::pattern::wildcard_match;
use obscurity::reconstruct::FoundPayload;
use obscurity::{AddressTarget, KeyMode, Mask256, MatchTarget, SearchConfig, SearchEngine};

#[test]
fn wildcard_pattern_delivers_matching_addresses() {
    // "1?*" matches every P2PKH address, so the very first candidate
    // batch produces a hit.
    let target = MatchTarget::Address(
        AddressTarget::new(&["1?*".to_string()], true, KeyMode::Compressed).unwrap(),
    );
    let engine = SearchEngine::new(
        target,
        SearchConfig {
            cpu_workers: 1,
            group_size: 16,
            stop_when_found: true,
            start_key: Some([0x66u8; 32]),
            ..Default::default()
        },
    )
    .unwrap();

    let mut results = Vec::new();
    engine.run_with(|f| results.push(f)).unwrap();

    assert!(!results.is_empty());
    for f in &results {
        match &f.payload {
            FoundPayload::Address { address, .. } => {
                assert!(wildcard_match(address, "1?*", true), "{}", address);
                assert!(address.starts_with('1'));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }
}

#[test]
fn uncompressed_key_mode_finds_uncompressed_hash() {
    let start = [0x29u8; 32];
    let base = Scalar::from_bytes(&start);
    let planted = base.add(&Scalar::from_u64(40));
    let addr = hash160_to_address(
        AddressKind::P2pkh,
        &hash160(&public_key(&planted).to_uncompressed()),
    );

    let target = MatchTarget::Address(
        AddressTarget::new(&[addr.clone()], true, KeyMode::Uncompressed).unwrap(),
    );
    let engine = SearchEngine::new(
        target,
        SearchConfig {
            cpu_workers: 1,
            group_size: 64,
            stop_when_found: true,
            start_key: Some(start),
            ..Default::default()
        },
    )
    .unwrap();

    let mut results = Vec::new();
    engine.run_with(|f| results.push(f)).unwrap();

    let hit = results
        .iter()
        .find(|f| f.private_key == Some(planted))
        .expect("uncompressed planted address must be found");
    match &hit.payload {
        FoundPayload::Address {
            address,
            compressed,
            ..
        } => {
            assert_eq!(*address, addr);
            assert!(!compressed);
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn stop_waits_for_every_pattern() {
    // Two planted addresses in the same sweep: stop-on-found only fires
    // once both have verified results.
    let start = [0x31u8; 32];
    let base = Scalar::from_bytes(&start);
    let near = base.add(&Scalar::from_u64(20));
    let far = base.add(&Scalar::from_u64(200));

    let addr_of = |k: &Scalar| {
        hash160_to_address(
            AddressKind::P2pkh,
            &hash160(&public_key(k).to_compressed()),
        )
    };
    let patterns = vec![addr_of(&near), addr_of(&far)];

    let target = MatchTarget::Address(
        AddressTarget::new(&patterns, true, KeyMode::Compressed).unwrap(),
    );
    let engine = SearchEngine::new(
        target,
        SearchConfig {
            cpu_workers: 1,
            group_size: 64,
            stop_when_found: true,
            start_key: Some(start),
            ..Default::default()
        },
    )
    .unwrap();

    let mut keys = Vec::new();
    let progress = engine.run_with(|f| keys.push(f.private_key.unwrap())).unwrap();

    assert!(keys.contains(&near));
    assert!(keys.contains(&far));
    assert!(progress.patterns_found.iter().all(|&f| f));
    assert_eq!(progress.found, 2);
}

#[test]
fn progress_snapshot_carries_difficulty() {
    let engine = SearchEngine::new(
        MatchTarget::Mask(Mask256::from_hex("DEADBEEF", None).unwrap()),
        SearchConfig::default(),
    )
    .unwrap();
    let p = engine.progress();
    assert_eq!(p.tested, 0);
    assert_eq!(p.found, 0);
    assert_eq!(p.difficulty, 2f64.powi(32));
    assert_eq!(p.patterns_found, vec![false]);
    assert_eq!(p.success_probability(), 0.0);
}

#[test]
fn both_mode_counts_twelve_candidates_per_point() {
    use obscurity::predicate::Predicate;

    let compressed = MatchTarget::Address(
        AddressTarget::new(&["1Test".to_string()], true, KeyMode::Compressed).unwrap(),
    );
    let both = MatchTarget::Address(
        AddressTarget::new(&["1Test".to_string()], true, KeyMode::Both).unwrap(),
    );
    let mask = MatchTarget::Mask(Mask256::from_hex("AA", None).unwrap());

    assert_eq!(Predicate::new(&compressed).candidates_per_point(), 6);
    assert_eq!(Predicate::new(&both).candidates_per_point(), 12);
    assert_eq!(Predicate::new(&mask).candidates_per_point(), 3);
}
