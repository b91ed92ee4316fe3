//! Lowering a model document into graph-construction calls.
//!
//! Every `apply` node becomes one operator block. Nested results and literal
//! operands ride derived signals named after the variable being defined.

use fm_graph::{
    BlockKind, Extremum, LogicOp, Model, ModelBuilder, ModelError, Relation, Signal, SignalFlags,
    TrigFn, UnaryFn,
};
use tracing::debug;

use crate::ProjectResult;
use crate::schema::{Expr, ModelDoc, Operator, TableRef, VariableDef};

/// Translate a validated document into a builder ready for wiring.
pub fn compile(doc: &ModelDoc) -> ProjectResult<ModelBuilder> {
    let mut builder = ModelBuilder::new(doc.name.clone());

    for bp in &doc.breakpoints {
        builder.register_breakpoints(&bp.id, bp.values.clone())?;
    }
    for table in &doc.tables {
        let axes: Vec<&str> = table.axes.iter().map(String::as_str).collect();
        builder.register_table(Some(&table.id), &axes, table.values.clone())?;
    }
    for var in &doc.variables {
        builder.add_signal(signal_for(var))?;
    }
    for func in &doc.functions {
        let table_id = match &func.table {
            TableRef::Id(id) => id.clone(),
            TableRef::Inline { axes, values } => {
                let axes: Vec<&str> = axes.iter().map(String::as_str).collect();
                let handle = builder.register_table(None, &axes, values.clone())?;
                builder
                    .table(handle)
                    .map(|t| t.id().to_string())
                    .ok_or_else(|| ModelError::Invariant {
                        what: format!("table handle {handle} out of range"),
                    })?
            }
        };
        let inputs: Vec<&str> = func.inputs.iter().map(String::as_str).collect();
        builder.add_function(&func.name, &table_id, &inputs, &func.output)?;
    }
    for var in &doc.variables {
        if let Some(expr) = &var.calculation {
            let mut lowering = Lowering {
                builder: &mut builder,
                owner: &var.var_id,
                temps: 0,
            };
            lowering.lower_root(expr)?;
            debug!(var = %var.var_id, temps = lowering.temps, "lowered calculation");
        }
    }

    Ok(builder)
}

/// Compile, wire and hook up a document into a model.
pub fn build_model(doc: &ModelDoc) -> ProjectResult<Model> {
    Ok(compile(doc)?.build()?)
}

fn signal_for(var: &VariableDef) -> Signal {
    let flags = SignalFlags {
        input: var.input,
        output: var.output,
        control: var.control,
        disturbance: var.disturbance,
        state: var.state,
        state_deriv: var.state_deriv,
        derived: false,
    };
    let mut signal = Signal::new(var.var_id.clone(), var.display_name(), var.units.clone())
        .with_flags(flags)
        .with_limits(var.min, var.max);
    if let Some(v) = var.initial_value {
        signal = signal.with_initial_value(v);
    }
    signal
}

/// Block type for an operator.
pub fn block_kind(op: Operator) -> BlockKind {
    match op {
        Operator::Plus => BlockKind::Sum,
        Operator::Minus => BlockKind::Minus,
        Operator::Times => BlockKind::Product,
        Operator::Divide | Operator::Quotient => BlockKind::Quotient,
        Operator::Power => BlockKind::Power,
        Operator::Abs => BlockKind::Unary(UnaryFn::Abs),
        Operator::Floor => BlockKind::Unary(UnaryFn::Floor),
        Operator::Ceiling => BlockKind::Unary(UnaryFn::Ceiling),
        Operator::Exp => BlockKind::Unary(UnaryFn::Exp),
        Operator::Ln => BlockKind::Unary(UnaryFn::Ln),
        Operator::Log10 => BlockKind::Unary(UnaryFn::Log10),
        Operator::Sqrt => BlockKind::Unary(UnaryFn::Sqrt),
        Operator::Sin => BlockKind::Trig(TrigFn::Sin),
        Operator::Cos => BlockKind::Trig(TrigFn::Cos),
        Operator::Tan => BlockKind::Trig(TrigFn::Tan),
        Operator::Arcsin => BlockKind::Trig(TrigFn::Arcsin),
        Operator::Arccos => BlockKind::Trig(TrigFn::Arccos),
        Operator::Arctan => BlockKind::Trig(TrigFn::Arctan),
        Operator::Atan2 => BlockKind::Atan2,
        Operator::Min => BlockKind::MinMax(Extremum::Min),
        Operator::Max => BlockKind::MinMax(Extremum::Max),
        Operator::Lt => BlockKind::Relation(Relation::Lt),
        Operator::Leq => BlockKind::Relation(Relation::Leq),
        Operator::Eq => BlockKind::Relation(Relation::Eq),
        Operator::Geq => BlockKind::Relation(Relation::Geq),
        Operator::Gt => BlockKind::Relation(Relation::Gt),
        Operator::Neq => BlockKind::Relation(Relation::Neq),
        Operator::And => BlockKind::Logic(LogicOp::And),
        Operator::Or => BlockKind::Logic(LogicOp::Or),
        Operator::Not => BlockKind::Logic(LogicOp::Not),
        Operator::Piecewise => BlockKind::Switch,
    }
}

struct Lowering<'a> {
    builder: &'a mut ModelBuilder,
    owner: &'a str,
    temps: usize,
}

impl Lowering<'_> {
    fn lower_root(&mut self, expr: &Expr) -> ProjectResult<()> {
        let owner = self.owner.to_string();
        match expr {
            Expr::Number(value) | Expr::Const { value } => {
                let block = self
                    .builder
                    .add_block(&format!("{owner}_const"), BlockKind::Constant { value: *value })?;
                self.builder.set_output_var_id(block, owner)?;
            }
            Expr::Name(source) | Expr::Var { var: source } => {
                // a one-term sum passes the value through
                let block = self.builder.add_block(&format!("{owner}_copy"), BlockKind::Sum)?;
                self.builder.add_var_id(block, 0, source.clone())?;
                self.builder.set_output_var_id(block, owner)?;
            }
            Expr::Apply { apply, args } => self.lower_apply(*apply, args, &owner)?,
        }
        Ok(())
    }

    fn lower_apply(&mut self, op: Operator, args: &[Expr], output: &str) -> ProjectResult<()> {
        let kind = block_kind(op);
        let block = self
            .builder
            .add_block(&format!("{output}_{}", kind.tag()), kind)?;
        for (port, arg) in args.iter().enumerate() {
            let operand = self.lower_operand(arg)?;
            self.builder.add_var_id(block, port, operand)?;
        }
        self.builder.set_output_var_id(block, output)?;
        Ok(())
    }

    /// Variable carrying the operand's value, creating blocks as needed.
    fn lower_operand(&mut self, expr: &Expr) -> ProjectResult<String> {
        match expr {
            Expr::Name(id) | Expr::Var { var: id } => Ok(id.clone()),
            Expr::Number(value) | Expr::Const { value } => {
                let temp = self.temp_signal()?;
                let block = self
                    .builder
                    .add_block(&format!("{temp}_const"), BlockKind::Constant { value: *value })?;
                self.builder.set_output_var_id(block, temp.clone())?;
                Ok(temp)
            }
            Expr::Apply { apply, args } => {
                let temp = self.temp_signal()?;
                self.lower_apply(*apply, args, &temp)?;
                Ok(temp)
            }
        }
    }

    fn temp_signal(&mut self) -> ProjectResult<String> {
        let var_id = loop {
            self.temps += 1;
            let candidate = format!("{}_t{}", self.owner, self.temps);
            if self.builder.signal_id(&candidate).is_none() {
                break candidate;
            }
        };
        let flags = SignalFlags {
            derived: true,
            ..SignalFlags::default()
        };
        self.builder
            .add_signal(Signal::new(var_id.clone(), var_id.clone(), "").with_flags(flags))?;
        Ok(var_id)
    }
}
