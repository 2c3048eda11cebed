//! End-to-end checks of the portfolio manager.

use equiverse::{
    ApplicationSchemeType, Configuration, CostProfile, CostRule, EquivalenceCheckingManager,
    StateType, Verdict,
};
use gatewise::{Circuit, Gate, Operation};

fn sequential(config: &mut Configuration) {
    config.execution.parallel = false;
}

fn only_simulation(config: &mut Configuration) {
    config.execution.run_alternating_checker = false;
    config.execution.run_construction_checker = false;
    config.execution.run_zx_checker = false;
    config.execution.run_simulation_checker = true;
}

fn run(qc1: &Circuit, qc2: &Circuit, config: Configuration) -> EquivalenceCheckingManager {
    let mut manager = EquivalenceCheckingManager::new(qc1, qc2, config).expect("construction");
    manager.run().expect("run");
    manager
}

#[test]
fn identical_single_qubit_circuits_in_parallel() {
    let mut qc = Circuit::new(1);
    qc.h(0);

    let mut config = Configuration::default();
    config.simulation.seed = 42;
    let manager = run(&qc, &qc.clone(), config);
    assert_eq!(manager.equivalence(), Verdict::Equivalent);

    let results = manager.results();
    assert!(results.performed_simulations <= results.started_simulations);
}

#[test]
fn x_versus_y_sequentially() {
    let mut qc1 = Circuit::new(1);
    qc1.x(0);
    let mut qc2 = Circuit::new(1);
    qc2.y(0);

    let mut config = Configuration::default();
    sequential(&mut config);
    config.execution.run_zx_checker = false;
    config.execution.run_construction_checker = false;
    config.simulation.seed = 7;

    let manager = run(&qc1, &qc2, config);
    assert_eq!(manager.equivalence(), Verdict::NotEquivalent);
}

#[test]
fn ancilla_padding_with_stabilizer_stimuli() {
    let mut qc1 = Circuit::new(1);
    qc1.x(0);
    // same functionality with a z on an extra workspace qubit
    let mut qc2 = Circuit::new(2);
    qc2.x(0);
    qc2.z(1);

    let mut config = Configuration::default();
    only_simulation(&mut config);
    config.simulation.state_type = StateType::Stabilizer;
    config.simulation.max_sims = 8;
    config.simulation.seed = 21;

    let manager = run(&qc1, &qc2, config);
    assert!(manager.equivalence().considered_equivalent());

    let results = manager.results();
    assert!(results.started_simulations >= results.performed_simulations);
    assert!(results.started_simulations <= 8);
}

#[test]
fn global_phase_with_construction_only() {
    let mut qc1 = Circuit::new(2);
    qc1.h(0);
    qc1.cx(0, 1);
    let mut qc2 = qc1.clone();
    qc2.gphase(std::f64::consts::FRAC_PI_4);

    let mut config = Configuration::default();
    sequential(&mut config);
    config.execution.run_simulation_checker = false;
    config.execution.run_alternating_checker = false;
    config.execution.run_zx_checker = false;
    config.execution.run_construction_checker = true;

    let manager = run(&qc1, &qc2, config);
    assert_eq!(manager.equivalence(), Verdict::EquivalentUpToGlobalPhase);
}

#[cfg(unix)]
#[test]
fn tiny_timeout_yields_no_information_or_a_fast_win() {
    // moderately wide circuits so the matrix engines take real time; the
    // toffoli keeps the zx engine out of the portfolio
    let toffoli = || Operation::controlled(Gate::X, [0, 1], [2]);
    let mut qc1 = gatewise::random_clifford_circuit(10, 6, 99);
    qc1.push(toffoli());
    let mut qc2 = qc1.clone();
    qc2.x(0);

    let mut config = Configuration::default();
    config.execution.timeout_seconds = 0.001;
    config.execution.nthreads = 4;
    config.execution.run_simulation_checker = false;
    config.execution.run_construction_checker = true;
    config.simulation.seed = 3;

    let started = std::time::Instant::now();
    let manager = run(&qc1, &qc2, config);
    // the deadline is enforced up to scheduling slack
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    assert!(matches!(
        manager.equivalence(),
        Verdict::NoInformation | Verdict::NotEquivalent
    ));
}

#[test]
fn zx_intractable_pair_with_only_zx_enabled() {
    let mut qc = Circuit::new(3);
    qc.push(Operation::controlled(Gate::X, [0, 1], [2]));

    let mut config = Configuration::default();
    config.execution.run_simulation_checker = false;
    config.execution.run_alternating_checker = false;
    config.execution.run_construction_checker = false;
    config.execution.run_zx_checker = true;

    let manager = run(&qc, &qc.clone(), config);
    assert_eq!(manager.equivalence(), Verdict::NoInformation);
}

#[test]
fn empty_circuits_are_equivalent_without_launching_engines() {
    let qc1 = Circuit::new(2);
    let qc2 = Circuit::new(3);

    let manager = run(&qc1, &qc2, Configuration::default());
    assert_eq!(manager.equivalence(), Verdict::Equivalent);
    assert_eq!(manager.results().started_simulations, 0);
    assert_eq!(manager.results().check_time, 0.0);
}

#[test]
fn nothing_enabled_yields_no_information() {
    let mut qc = Circuit::new(1);
    qc.h(0);

    let mut manager =
        EquivalenceCheckingManager::new(&qc, &qc.clone(), Configuration::default()).unwrap();
    manager.disable_all_checkers();
    manager.run().unwrap();

    assert_eq!(manager.equivalence(), Verdict::NoInformation);
    assert!(manager.results().preprocessing_time >= 0.0);
    assert_eq!(manager.results().check_time, 0.0);
}

#[test]
fn simulation_budget_is_clamped_to_unique_basis_states() {
    let mut qc = Circuit::new(1);
    qc.h(0);

    let mut config = Configuration::default();
    only_simulation(&mut config);
    sequential(&mut config);
    config.simulation.max_sims = 100;
    config.simulation.seed = 5;

    let manager = run(&qc, &qc.clone(), config);
    let results = manager.results();
    assert_eq!(results.started_simulations, 2);
    assert_eq!(results.performed_simulations, 2);
    assert!(manager.equivalence().considered_equivalent());
}

#[test]
fn sequential_and_parallel_agree_on_seeded_runs() {
    let mut qc1 = Circuit::new(3);
    qc1.h(0);
    qc1.cx(0, 1);
    qc1.cx(1, 2);
    // the same circuit with a cancelling pair appended, so every engine in
    // the portfolio can reach the same positive conclusion
    let mut qc2 = qc1.clone();
    qc2.t(2);
    qc2.push(Operation::unitary(Gate::Tdg, [2]));

    let mut base = Configuration::default();
    base.simulation.seed = 1234;

    let mut seq_config = base.clone();
    sequential(&mut seq_config);
    let seq = run(&qc1, &qc2, seq_config);

    let par = run(&qc1, &qc2, base);
    assert_eq!(seq.equivalence(), par.equivalence());
    assert_eq!(seq.equivalence(), Verdict::Equivalent);
}

#[test]
fn counter_example_survives_in_process_simulation() {
    let mut qc1 = Circuit::new(1);
    qc1.x(0);
    let qc2 = Circuit::new(1);

    let mut config = Configuration::default();
    only_simulation(&mut config);
    sequential(&mut config);
    config.simulation.seed = 11;

    let manager = run(&qc1, &qc2, config);
    assert_eq!(manager.equivalence(), Verdict::NotEquivalent);
    let cex = manager
        .results()
        .counter_example
        .as_ref()
        .expect("counter-example from in-process trial");
    assert!((cex.output1.fidelity(&cex.output2)) < 0.5);
}

#[test]
fn swapped_wires_against_relabeled_outputs() {
    let mut qc1 = Circuit::new(2);
    qc1.x(0);
    qc1.cx(0, 1);
    qc1.swap(0, 1);
    // swap expressed as three alternating cnots, reconstructed and elided
    // during preprocessing
    let mut qc2 = Circuit::new(2);
    qc2.x(0);
    qc2.cx(0, 1);
    qc2.cx(0, 1);
    qc2.cx(1, 0);
    qc2.cx(0, 1);

    let mut config = Configuration::default();
    sequential(&mut config);
    config.simulation.seed = 8;
    let manager = run(&qc1, &qc2, config);
    assert_eq!(manager.equivalence(), Verdict::Equivalent);
}

#[test]
fn gate_cost_profile_setter_forces_the_scheme() {
    let mut qc1 = Circuit::new(2);
    qc1.cx(0, 1);
    let qc2 = qc1.clone();

    let mut config = Configuration::default();
    sequential(&mut config);
    config.simulation.seed = 6;
    let mut manager = EquivalenceCheckingManager::new(&qc1, &qc2, config).unwrap();
    manager.set_gate_cost_profile(CostProfile::Inline(vec![CostRule("x".into(), 1, 3)]));
    assert_eq!(
        manager.configuration().application.alternating_scheme,
        ApplicationSchemeType::GateCost
    );
    manager.run().unwrap();
    assert_eq!(manager.equivalence(), Verdict::Equivalent);
}

#[test]
fn dynamic_circuits_require_the_transform_option() {
    let mut qc1 = Circuit::new(1);
    qc1.reset(0);
    let qc2 = Circuit::new(1);

    let err = EquivalenceCheckingManager::new(&qc1, &qc2, Configuration::default());
    assert!(err.is_err());

    let mut config = Configuration::default();
    config.optimizations.transform_dynamic_circuit = true;
    assert!(EquivalenceCheckingManager::new(&qc1, &qc2, config).is_ok());
}

#[test]
fn parameterized_circuits_take_the_symbolic_path() {
    let theta = gatewise::Angle::Symbolic {
        name: "theta".into(),
        factor: 1.0,
    };
    let mut qc1 = Circuit::new(1);
    qc1.push(Operation::unitary(Gate::Rz(theta.clone()), [0]));
    let mut qc2 = Circuit::new(1);
    qc2.push(Operation::unitary(Gate::Rz(theta), [0]));

    let mut config = Configuration::default();
    config.parameterized.additional_instantiations = 2;
    config.simulation.seed = 77;

    let manager = run(&qc1, &qc2, config);
    assert_eq!(manager.equivalence(), Verdict::Equivalent);
    assert_eq!(manager.results().performed_instantiations, 3);
    let json = manager.results().json();
    assert_eq!(json["parameterized"]["performed_instantiations"], 3);
}

#[test]
fn results_json_has_the_documented_shape() {
    let mut qc = Circuit::new(1);
    qc.h(0);

    let mut config = Configuration::default();
    sequential(&mut config);
    config.simulation.seed = 2;
    let manager = run(&qc, &qc.clone(), config);

    let json = manager.results().json();
    assert!(json["preprocessing_time"].is_number());
    assert!(json["check_time"].is_number());
    assert_eq!(json["equivalence"], "equivalent");
    assert!(json["checkers"].is_array());
    if manager.results().started_simulations > 0 {
        assert!(json["simulations"]["started"].as_u64().unwrap() > 0);
    }
}
