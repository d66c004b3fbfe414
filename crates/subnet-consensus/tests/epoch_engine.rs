// crates/subnet-consensus/tests/epoch_engine.rs
//
// End-to-end tests for the epoch engine.
//
// Drives `EpochEngine::run_epoch` against the in-memory registry and both
// epoch store backends across several epochs: scheduling, bonds carried
// across membership changes, emission conservation and determinism.

use uuid::Uuid;

use subnet_consensus::{EngineConfig, EpochEngine, EpochSchedule, PoolSplitPolicy};
use subnet_core::{
    DegenerateReason, EpochResult, EpochStore, Fixed, NetUid, Participant, RawParams,
};
use subnet_store::{MemoryRegistry, MemoryStore, RocksStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const NETUID: NetUid = 1;

/// Create a temporary database path using UUID to avoid conflicts.
fn temp_db_path(label: &str) -> String {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("subnet_test_{}_{}", label, Uuid::now_v7()));
    path.to_string_lossy().to_string()
}

fn fx(s: &str) -> Fixed {
    s.parse().unwrap()
}

fn approx(a: Fixed, b: f64) -> bool {
    (a.to_num::<f64>() - b).abs() < 1e-9
}

fn raw(pairs: &[(&str, &str)]) -> RawParams {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Registry with the three-participant example subnet.
fn example_registry(params: &[(&str, &str)]) -> MemoryRegistry {
    let registry = MemoryRegistry::new();
    registry.add_subnet(NETUID, raw(params)).unwrap();
    for (address, stake) in [("a", 100), ("b", 200), ("c", 300)] {
        registry.register(NETUID, Participant::new(address, stake)).unwrap();
    }
    registry
        .set_weights(NETUID, "a", vec![("a".into(), fx("0")), ("b".into(), fx("0.2")), ("c".into(), fx("0.3"))])
        .unwrap();
    registry
        .set_weights(NETUID, "b", vec![("a".into(), fx("0.4")), ("b".into(), fx("0")), ("c".into(), fx("0.6"))])
        .unwrap();
    registry
        .set_weights(NETUID, "c", vec![("a".into(), fx("0.7")), ("b".into(), fx("0.8")), ("c".into(), fx("0"))])
        .unwrap();
    registry
}

fn run_at<S: EpochStore>(engine: &EpochEngine<MemoryRegistry, S>, block: u64, budget: u64) -> Option<EpochResult> {
    engine.registry().set_block(block);
    engine.run_epoch(NETUID, budget).unwrap().into_result()
}

fn assert_conserved(result: &EpochResult) {
    let incentives: u64 = result.participants.iter().map(|p| p.incentive).sum();
    let dividends: u64 = result.participants.iter().map(|p| p.dividend).sum();
    assert!(incentives <= result.incentive_pool);
    assert!(dividends <= result.dividend_pool);
    assert!(result.incentive_pool + result.dividend_pool <= result.emission_budget);
    assert!(result.total_emitted() <= result.emission_budget);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_example_subnet_golden_consensus() {
    let engine = EpochEngine::new(
        example_registry(&[("tempo", "10")]),
        MemoryStore::new(),
        EngineConfig::default(),
    );
    let result = run_at(&engine, 10, 1_000_000).expect("epoch due");

    assert_eq!(result.degenerate, None);
    let a = result.participant("a").unwrap();
    let b = result.participant("b").unwrap();
    let c = result.participant("c").unwrap();

    assert!(approx(a.stake, 1.0 / 6.0));
    assert!(approx(b.stake, 1.0 / 3.0));
    assert!(approx(c.stake, 0.5));

    assert!(approx(a.consensus, 0.4));
    assert!(approx(b.consensus, 0.4));
    assert_eq!(c.consensus, Fixed::ZERO);

    let stake_sum: f64 = result.participants.iter().map(|p| p.stake.to_num::<f64>()).sum();
    assert!((stake_sum - 1.0).abs() < 1e-12);
    assert_conserved(&result);

    // Persisted bonds equal the reported rows.
    let stored = engine.store().prior_bonds(NETUID).unwrap();
    assert_eq!(stored.get("c", "a"), c.bonds[0]);
    assert_eq!(stored.get("a", "c"), a.bonds[2]);
    assert_eq!(stored.get("a", "a"), Fixed::ZERO);
}

#[test]
fn test_results_are_bit_identical_across_backends() {
    let memory = EpochEngine::new(
        example_registry(&[("tempo", "5"), ("liquid_alpha_enabled", "true")]),
        MemoryStore::new(),
        EngineConfig::default(),
    );
    let rocks = EpochEngine::new(
        example_registry(&[("tempo", "5"), ("liquid_alpha_enabled", "true")]),
        RocksStore::open(&temp_db_path("identical")).unwrap(),
        EngineConfig::default(),
    );

    for block in [5, 10, 15, 20] {
        let from_memory = run_at(&memory, block, 777_777).unwrap();
        let from_rocks = run_at(&rocks, block, 777_777).unwrap();
        assert_eq!(from_memory, from_rocks);
    }
    assert_eq!(
        memory.store().prior_bonds(NETUID).unwrap(),
        rocks.store().prior_bonds(NETUID).unwrap()
    );
}

#[test]
fn test_bonds_accumulate_and_survive_restart() {
    let path = temp_db_path("restart");
    let first_bonds;
    {
        let engine = EpochEngine::new(
            example_registry(&[("tempo", "10")]),
            RocksStore::open(&path).unwrap(),
            EngineConfig::default(),
        );
        let r1 = run_at(&engine, 10, 1_000).unwrap();
        first_bonds = r1.participant("c").unwrap().bonds.clone();
    }

    let engine = EpochEngine::new(
        example_registry(&[("tempo", "10")]),
        RocksStore::open(&path).unwrap(),
        EngineConfig::default(),
    );
    assert_eq!(engine.store().last_epoch_block(NETUID).unwrap(), 10);
    assert!(run_at(&engine, 15, 1_000).is_none());

    let r2 = run_at(&engine, 20, 1_000).unwrap();
    let second_bonds = &r2.participant("c").unwrap().bonds;
    // c -> a keeps moving toward its clipped weight.
    assert!(second_bonds[0] > first_bonds[0]);
    assert!(second_bonds[0] < fx("0.5"));
}

#[test]
fn test_departed_participant_bonds_dropped() {
    let registry = example_registry(&[("tempo", "10")]);
    let engine = EpochEngine::new(registry, MemoryStore::new(), EngineConfig::default());
    run_at(&engine, 10, 1_000).unwrap();
    assert!(engine.store().prior_bonds(NETUID).unwrap().get("b", "c") > Fixed::ZERO);

    engine.registry().deregister(NETUID, "b").unwrap();
    let result = run_at(&engine, 20, 1_000).unwrap();

    assert_eq!(result.participants.len(), 2);
    let bonds = engine.store().prior_bonds(NETUID).unwrap();
    assert!(bonds.iter().all(|(from, to, _)| from != "b" && to != "b"));
    // Weights at the departed address are dropped as malformed.
    assert_eq!(result.malformed_weights, 2);
}

#[test]
fn test_newcomer_ignores_stale_weights() {
    let registry = example_registry(&[("tempo", "10")]);
    let engine = EpochEngine::new(registry, MemoryStore::new(), EngineConfig::default());
    run_at(&engine, 10, 1_000).unwrap();

    // "b" re-registers at block 15: weights set before then targeted the old occupant.
    engine.registry().set_block(15);
    let mut fresh = Participant::new("b", 200);
    fresh.registration_block = 15;
    engine.registry().register(NETUID, fresh).unwrap();

    let result = run_at(&engine, 20, 1_000).unwrap();
    let a = result.participant("a").unwrap();
    let c = result.participant("c").unwrap();
    // Nobody's row points at "b" any more, so its consensus is zero.
    assert_eq!(result.participant("b").unwrap().consensus, Fixed::ZERO);
    // "a" now spends its whole row on "c"; "c" spends its whole row on "a".
    assert!(a.validator_trust > Fixed::ZERO);
    assert!(c.validator_trust > Fixed::ZERO);
    // Bonds toward the re-registered address decay.
    assert!(a.bonds[1] > Fixed::ZERO);
    assert!(a.bonds[1] < fx("0.04"));
}

#[test]
fn test_inactive_participant_earns_nothing() {
    let registry = example_registry(&[("tempo", "100"), ("activity_cutoff", "50"), ("immunity_period", "0")]);
    let engine = EpochEngine::new(registry, MemoryStore::new(), EngineConfig::default());

    // Keep a and b active, let c fall silent.
    engine.registry().set_block(100);
    engine
        .registry()
        .set_weights(NETUID, "a", vec![("b".into(), fx("0.5")), ("c".into(), fx("0.5"))])
        .unwrap();
    engine
        .registry()
        .set_weights(NETUID, "b", vec![("a".into(), fx("0.5")), ("c".into(), fx("0.5"))])
        .unwrap();

    let result = engine.run_epoch(NETUID, 10_000).unwrap().into_result().unwrap();
    let c = result.participant("c").unwrap();
    assert!(!c.active);
    assert_eq!(c.stake, Fixed::ZERO);
    assert_eq!(c.incentive_share, Fixed::ZERO);
    assert_eq!(c.dividend_share, Fixed::ZERO);
    assert_eq!(c.emission(), 0);
    assert!(c.bonds.iter().all(|b| *b == Fixed::ZERO));
    assert_conserved(&result);
}

#[test]
fn test_all_inactive_is_degenerate_and_advances() {
    let registry = example_registry(&[("tempo", "10"), ("activity_cutoff", "5"), ("immunity_period", "0")]);
    let engine = EpochEngine::new(registry, MemoryStore::new(), EngineConfig::default());
    let result = run_at(&engine, 100, 1_000).unwrap();

    assert_eq!(result.degenerate, Some(DegenerateReason::NoActiveParticipants));
    assert_eq!(result.total_emitted(), 0);
    assert!(result.participants.iter().all(|p| p.consensus == Fixed::ZERO));
    assert_eq!(engine.store().last_epoch_block(NETUID).unwrap(), 100);
    assert!(run_at(&engine, 100, 1_000).is_none());
}

#[test]
fn test_rate_limited_epoch_decays_stored_bonds() {
    let registry = example_registry(&[("tempo", "10")]);
    let engine = EpochEngine::new(registry, MemoryStore::new(), EngineConfig::default());
    run_at(&engine, 10, 1_000).unwrap();
    let before = engine.store().prior_bonds(NETUID).unwrap();
    assert!(!before.is_empty());

    // Every row was submitted less than 100 blocks ago.
    engine.registry().set_param(NETUID, "weights_set_rate_limit", "100").unwrap();
    let result = run_at(&engine, 20, 1_000).unwrap();
    assert_eq!(result.degenerate, Some(DegenerateReason::NoWeights));
    assert_eq!(result.total_emitted(), 0);
    assert_eq!(engine.store().last_epoch_block(NETUID).unwrap(), 20);

    let after = engine.store().prior_bonds(NETUID).unwrap();
    for (from, to, value) in before.iter() {
        assert!(after.get(from, to) < value, "{from} -> {to} did not decay");
        assert!(after.get(from, to) > Fixed::ZERO);
    }
    let c = result.participant("c").unwrap();
    assert_eq!(c.bonds[0], after.get("c", "a"));
}

#[test]
fn test_emission_conserved_over_many_epochs() {
    let registry = MemoryRegistry::new();
    registry
        .add_subnet(NETUID, raw(&[("tempo", "3"), ("liquid_alpha_enabled", "true"), ("kappa", "0.6")]))
        .unwrap();
    let names: Vec<String> = (0..7).map(|i| format!("p{}", i)).collect();
    for (i, name) in names.iter().enumerate() {
        registry.register(NETUID, Participant::new(name.clone(), 1_000 + 137 * i as u64)).unwrap();
    }
    for (i, name) in names.iter().enumerate() {
        let weights = names
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, target)| (target.clone(), Fixed::from_num(((i * 7 + j * 3) % 11 + 1) as u32)))
            .collect();
        registry.set_weights(NETUID, name, weights).unwrap();
    }

    let config = EngineConfig {
        schedule: EpochSchedule::Elapsed,
        pool_split: PoolSplitPolicy::Fraction { incentive: fx("0.41") },
    };
    let engine = EpochEngine::new(registry, MemoryStore::new(), config);

    let mut epochs = 0;
    for block in 1..=60 {
        if let Some(result) = run_at(&engine, block, 1_000_000_007) {
            epochs += 1;
            assert_conserved(&result);
            assert_eq!(result.incentive_pool, 410_000_002);
            let shares: f64 = result.participants.iter().map(|p| p.incentive_share.to_num::<f64>()).sum();
            assert!((shares - 1.0).abs() < 1e-12);
            // Bonds are convex combinations of normalized weights.
            for p in &result.participants {
                assert!(p.bonds.iter().all(|b| *b >= Fixed::ZERO && *b <= Fixed::ONE));
            }
        }
    }
    assert_eq!(epochs, 20);
}

#[test]
fn test_modular_schedule_staggers_subnets() {
    let registry = example_registry(&[("tempo", "4")]);
    let mut params = RawParams::new();
    params.insert("tempo".into(), "4".into());
    registry.add_subnet(2, params).unwrap();
    registry.register(2, Participant::new("x", 10)).unwrap();

    let config = EngineConfig {
        schedule: EpochSchedule::Modular,
        ..EngineConfig::default()
    };
    let engine = EpochEngine::new(registry, MemoryStore::new(), config);

    let mut due_one = Vec::new();
    let mut due_two = Vec::new();
    for block in 1..=15 {
        engine.registry().set_block(block);
        if engine.run_epoch(1, 100).unwrap().is_due() {
            due_one.push(block);
        }
        if engine.run_epoch(2, 100).unwrap().is_due() {
            due_two.push(block);
        }
    }
    // period 5: netuid 1 fires at block + 2 = 0 mod 5, netuid 2 at block + 3 = 0 mod 5.
    assert_eq!(due_one, vec![3, 8, 13]);
    assert_eq!(due_two, vec![2, 7, 12]);
}

#[test]
fn test_result_serializes_to_json() {
    let engine = EpochEngine::new(
        example_registry(&[("tempo", "1")]),
        MemoryStore::new(),
        EngineConfig::default(),
    );
    let result = run_at(&engine, 1, 600).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["netuid"], 1);
    assert_eq!(json["participants"].as_array().unwrap().len(), 3);
    assert_eq!(json["participants"][2]["stake"], "0.5");
    assert!(json["degenerate"].is_null());
}
