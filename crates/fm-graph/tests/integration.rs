//! Integration tests for fm-graph.

use fm_graph::{BlockId, BlockKind, Model, ModelBuilder, ModelError, Signal};
use proptest::prelude::*;

/// Every block appears after the producers of all its inputs.
fn assert_topological(model: &Model) {
    let order = model.execution_order().expect("initialized");
    assert_eq!(order.len(), model.blocks().len());
    let mut position = vec![usize::MAX; model.blocks().len()];
    for (pos, id) in order.iter().enumerate() {
        position[id.index()] = pos;
    }
    for (i, block) in model.blocks().iter().enumerate() {
        for &input in block.inputs() {
            let producer = model.signal(input).unwrap().source().unwrap().block;
            assert!(
                position[producer.index()] < position[i],
                "{} scheduled before its producer",
                block.name()
            );
        }
    }
}

fn lift_drag_model() -> Model {
    // CL = f(ALPHA, MACH) over a 3x2 grid; CD = K * CL^2
    let mut b = ModelBuilder::new("aero");
    b.add_signal(Signal::new("ALPHA", "angleOfAttack", "deg").as_input()).unwrap();
    b.add_signal(Signal::new("MACH", "mach", "nd").as_input()).unwrap();
    b.add_signal(Signal::new("CL", "liftCoefficient", "nd").as_output()).unwrap();
    b.add_signal(Signal::new("K", "inducedDragFactor", "nd").with_initial_value(0.5)).unwrap();
    b.add_signal(Signal::new("TWO", "two", "nd").with_initial_value(2.0)).unwrap();
    b.add_signal(Signal::new("CL2", "clSquared", "nd")).unwrap();
    b.add_signal(Signal::new("CD", "dragCoefficient", "nd").as_output()).unwrap();

    b.register_breakpoints("ALPHA_BP", vec![0.0, 10.0, 20.0]).unwrap();
    b.register_breakpoints("MACH_BP", vec![0.0, 1.0]).unwrap();
    #[rustfmt::skip]
    let values = vec![
        0.0, 0.1,
        0.8, 1.0,
        1.2, 1.6,
    ];
    b.register_table(Some("CL_T"), &["ALPHA_BP", "MACH_BP"], values).unwrap();

    let drag = b.add_block("cd", BlockKind::Product).unwrap();
    b.add_var_id(drag, 0, "K").unwrap();
    b.add_var_id(drag, 1, "CL2").unwrap();
    b.set_output_var_id(drag, "CD").unwrap();
    let square = b.add_block("cl2", BlockKind::Power).unwrap();
    b.add_var_id(square, 0, "CL").unwrap();
    b.add_var_id(square, 1, "TWO").unwrap();
    b.set_output_var_id(square, "CL2").unwrap();
    b.add_function("cl", "CL_T", &["ALPHA", "MACH"], "CL").unwrap();

    b.build().unwrap()
}

#[test]
fn gridded_function_evaluates_end_to_end() {
    let mut m = lift_drag_model();
    assert!(m.verify_integrity());
    m.initialize().unwrap();
    assert_topological(&m);

    m.set_input_value("ALPHA", 5.0).unwrap();
    m.set_input_value("MACH", 0.5).unwrap();
    m.cycle().unwrap();

    // alpha 0.5 of the way, mach 0.5 of the way
    let cl = m.value_of("CL").unwrap();
    let row0: f64 = 0.0 + (0.1 - 0.0) * 0.5;
    let row1: f64 = 0.8 + (1.0 - 0.8) * 0.5;
    assert_eq!(cl.to_bits(), (row0 + (row1 - row0) * 0.5).to_bits());
    assert_eq!(m.value_of("CD").unwrap(), 0.5 * cl.powf(2.0));

    let names: Vec<String> = m.output_vector().into_iter().map(|v| v.var_id).collect();
    assert_eq!(names, vec!["CL".to_string(), "CD".to_string()]);
}

#[test]
fn table_query_at_last_breakpoints_returns_corner() {
    let mut m = lift_drag_model();
    m.set_input_value("ALPHA", 20.0).unwrap();
    m.set_input_value("MACH", 1.0).unwrap();
    m.cycle().unwrap();
    assert_eq!(m.value_of("CL"), Some(1.6));

    // interior alpha, mach on its last breakpoint: blend of the mach=1 column
    m.set_input_value("ALPHA", 15.0).unwrap();
    m.cycle().unwrap();
    let edge: f64 = 1.0 + (1.6 - 1.0) * 0.5;
    assert_eq!(m.value_of("CL").unwrap().to_bits(), edge.to_bits());

    // far beyond the grid clamps to the same corner
    m.set_input_value("ALPHA", 90.0).unwrap();
    m.set_input_value("MACH", 3.0).unwrap();
    m.cycle().unwrap();
    assert_eq!(m.value_of("CL"), Some(1.6));
}

#[test]
fn normalizer_exposes_index_and_weight() {
    let mut b = ModelBuilder::new("bp");
    b.add_signal(Signal::new("X", "x", "").as_input()).unwrap();
    b.register_breakpoints("G", vec![0.0, 10.0, 20.0, 30.0]).unwrap();
    let iw = b.add_normalizer("G", "X").unwrap();
    let mut m = b.build().unwrap();

    for (x, expected) in [(15.0, 1.5), (-5.0, 0.0), (35.0, 3.0)] {
        m.set_input_value("X", x).unwrap();
        m.cycle().unwrap();
        assert_eq!(m.value_of(&iw), Some(expected), "x = {x}");
    }

    let normalizer = m.signal_by_var_id(&iw).unwrap().source().unwrap().block;
    let set = m.breakpoints_for(normalizer).unwrap();
    assert_eq!(set.values(), &[0.0, 10.0, 20.0, 30.0]);
    assert_eq!(set.users(), &[normalizer]);
}

#[test]
fn bilinear_example_through_blocks() {
    let mut b = ModelBuilder::new("bilinear");
    b.add_signal(Signal::new("U", "u", "").as_input()).unwrap();
    b.add_signal(Signal::new("V", "v", "").as_input()).unwrap();
    b.add_signal(Signal::new("F", "f", "").as_output()).unwrap();
    b.register_breakpoints("UNIT", vec![0.0, 1.0]).unwrap();
    b.register_table(None, &["UNIT", "UNIT"], vec![0.0, 1.0, 1.0, 2.0]).unwrap();
    b.add_function("f", "anon_table_1", &["U", "V"], "F").unwrap();
    let mut m = b.build().unwrap();
    m.set_input_value("U", 0.5).unwrap();
    m.set_input_value("V", 0.5).unwrap();
    m.cycle().unwrap();
    assert_eq!(m.value_of("F"), Some(1.0));

    let lookup: Vec<BlockId> = m.lookup_blocks().collect();
    assert_eq!(lookup.len(), 1);
    let table = m.table_for(lookup[0]).unwrap();
    assert_eq!(table.dims(), &[2, 2]);
    assert_eq!(table.axis_ids(), &["UNIT".to_string(), "UNIT".to_string()]);
    // both axes normalize against UNIT but with different inputs
    assert_eq!(m.breakpoint_set_by_id("UNIT").unwrap().users().len(), 2);
}

#[test]
fn limiter_preserves_downstream_arity() {
    let mut b = ModelBuilder::new("lim");
    b.add_signal(
        Signal::new("DE", "elevator", "deg")
            .as_input()
            .with_limits(Some(-20.0), Some(20.0)),
    )
    .unwrap();
    for (i, name) in ["A", "B", "C"].iter().enumerate() {
        b.add_signal(Signal::new(*name, *name, "")).unwrap();
        let blk = b.add_block(&format!("neg{i}"), BlockKind::Minus).unwrap();
        b.add_var_id(blk, 0, "DE").unwrap();
        b.set_output_var_id(blk, *name).unwrap();
    }
    let before = 3;
    let mut m = b.build().unwrap();
    assert_eq!(m.signal_by_var_id("DE").unwrap().sinks().len(), before);
    assert!(m.verify_integrity());

    m.set_input_value("DE", -45.0).unwrap();
    m.cycle().unwrap();
    assert_eq!(m.value_of("A"), Some(20.0));
}

#[test]
fn unresolved_reference_aborts_construction() {
    let mut b = ModelBuilder::new("bad");
    b.add_signal(Signal::new("Y", "y", "")).unwrap();
    let blk = b.add_block("abs", BlockKind::Unary(fm_graph::UnaryFn::Abs)).unwrap();
    b.add_var_id(blk, 0, "UNDEFINED").unwrap();
    b.set_output_var_id(blk, "Y").unwrap();
    assert!(matches!(
        b.build(),
        Err(ModelError::UnresolvedReference { .. })
    ));
}

#[test]
fn lookup_against_missing_table_is_rejected() {
    let mut b = ModelBuilder::new("bad");
    let err = b.add_function("f", "NOPE", &["X"], "F").unwrap_err();
    assert_eq!(err, ModelError::MissingFuncTable { id: "NOPE".into() });
    let err = b.add_normalizer("NOPE", "X").unwrap_err();
    assert_eq!(err, ModelError::MissingBreakpointSet { id: "NOPE".into() });
}

#[test]
fn conditional_switch_model() {
    // Y = X if X > 0 else 0
    let mut b = ModelBuilder::new("relu");
    b.add_signal(Signal::new("X", "x", "").as_input()).unwrap();
    b.add_signal(Signal::new("ZERO", "zero", "").with_initial_value(0.0)).unwrap();
    b.add_signal(Signal::new("POS", "positive", "")).unwrap();
    b.add_signal(Signal::new("Y", "y", "").as_output()).unwrap();
    let gt = b
        .add_block("gt", BlockKind::Relation(fm_graph::Relation::Gt))
        .unwrap();
    b.add_var_id(gt, 0, "X").unwrap();
    b.add_var_id(gt, 1, "ZERO").unwrap();
    b.set_output_var_id(gt, "POS").unwrap();
    let sw = b.add_block("sw", BlockKind::Switch).unwrap();
    b.add_var_id(sw, 0, "X").unwrap();
    b.add_var_id(sw, 1, "POS").unwrap();
    b.add_var_id(sw, 2, "ZERO").unwrap();
    b.set_output_var_id(sw, "Y").unwrap();
    let mut m = b.build().unwrap();

    m.set_input_value("X", 3.0).unwrap();
    m.cycle().unwrap();
    assert_eq!(m.value_of("Y"), Some(3.0));
    m.set_input_value("X", -3.0).unwrap();
    m.cycle().unwrap();
    assert_eq!(m.value_of("Y"), Some(0.0));
}

/// Random DAG: `inputs` external inputs, then one sum block per entry of
/// `nodes`, each reading two earlier signals. Blocks are declared in
/// reverse so producers appear after consumers.
fn random_dag(inputs: usize, nodes: &[(prop::sample::Index, prop::sample::Index)]) -> Model {
    let mut b = ModelBuilder::new("dag");
    let total = inputs + nodes.len();
    for i in 0..total {
        let mut s = Signal::new(format!("S{i}"), format!("s{i}"), "");
        if i < inputs {
            s = s.as_input();
        }
        b.add_signal(s).unwrap();
    }
    for (j, (a, c)) in nodes.iter().enumerate().rev() {
        let out = inputs + j;
        let blk = b.add_block(&format!("n{j}"), BlockKind::Sum).unwrap();
        b.add_var_id(blk, 0, format!("S{}", a.index(out))).unwrap();
        b.add_var_id(blk, 1, format!("S{}", c.index(out))).unwrap();
        b.set_output_var_id(blk, format!("S{out}")).unwrap();
    }
    b.build().unwrap()
}

proptest! {
    #[test]
    fn acyclic_graphs_schedule_topologically(
        inputs in 1_usize..4,
        nodes in prop::collection::vec(
            (any::<prop::sample::Index>(), any::<prop::sample::Index>()),
            1..16,
        ),
        values in prop::collection::vec(-10.0_f64..10.0, 4),
    ) {
        let mut m = random_dag(inputs, &nodes);
        prop_assert!(m.verify_integrity());
        m.initialize().unwrap();
        assert_topological(&m);

        for i in 0..inputs {
            m.set_input_value(&format!("S{i}"), values[i]).unwrap();
        }
        m.cycle().unwrap();
        let first: Vec<u64> = m.output_vector().iter().map(|v| v.value.to_bits()).collect();
        m.cycle().unwrap();
        let second: Vec<u64> = m.output_vector().iter().map(|v| v.value.to_bits()).collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn rings_are_algebraic_loops(k in 1_usize..7) {
        // S_i = -S_{i+1 mod k}
        let mut b = ModelBuilder::new("ring");
        for i in 0..k {
            b.add_signal(Signal::new(format!("S{i}"), format!("s{i}"), "")).unwrap();
        }
        for i in 0..k {
            let blk = b.add_block(&format!("neg{i}"), BlockKind::Minus).unwrap();
            b.add_var_id(blk, 0, format!("S{}", (i + 1) % k)).unwrap();
            b.set_output_var_id(blk, format!("S{i}")).unwrap();
        }
        let mut m = b.build().unwrap();
        let err = m.initialize().unwrap_err();
        prop_assert_eq!(
            err,
            ModelError::AlgebraicLoop {
                stuck: k,
                blocks: (0..k).map(|i| format!("neg{i}")).collect(),
            }
        );
        prop_assert!(m.cycle().is_err());
    }
}
