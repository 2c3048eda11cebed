use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use gatewise::{random_clifford_circuit, StateVector, Unitary};

fn bench_state_application(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_application");
    for qubits in [4usize, 8, 10] {
        let circ = random_clifford_circuit(qubits, 8, 1234);
        group.bench_with_input(BenchmarkId::from_parameter(qubits), &circ, |b, circ| {
            b.iter(|| {
                let mut state = StateVector::zero_state(circ.num_qubits());
                for op in &circ.ops {
                    state.apply(op).unwrap();
                }
                state
            });
        });
    }
    group.finish();
}

fn bench_unitary_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("unitary_construction");
    for qubits in [2usize, 4, 6] {
        let circ = random_clifford_circuit(qubits, 8, 1234);
        group.bench_with_input(BenchmarkId::from_parameter(qubits), &circ, |b, circ| {
            b.iter(|| {
                let mut u = Unitary::identity(circ.num_qubits());
                for op in &circ.ops {
                    u.apply_left(op).unwrap();
                }
                u
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_state_application, bench_unitary_construction);
criterion_main!(benches);
