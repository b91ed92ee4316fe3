//! Model document validation.

use std::collections::HashSet;

use fm_core::ensure_finite;

use crate::schema::{Expr, ModelDoc, TableRef};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_model(doc: &ModelDoc) -> Result<(), ValidationError> {
    if doc.version == 0 || doc.version > crate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: doc.version,
        });
    }

    let mut var_ids = HashSet::new();
    for var in &doc.variables {
        if !var_ids.insert(var.var_id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: var.var_id.clone(),
                context: "variables".to_string(),
            });
        }
        if let (Some(lo), Some(hi)) = (var.min, var.max) {
            if lo > hi {
                return Err(ValidationError::InvalidValue {
                    field: format!("{}.min", var.var_id),
                    value: lo.to_string(),
                    reason: format!("greater than max {hi}"),
                });
            }
        }
    }

    let mut bp_ids = HashSet::new();
    for bp in &doc.breakpoints {
        if !bp_ids.insert(bp.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: bp.id.clone(),
                context: "breakpoints".to_string(),
            });
        }
        if bp.values.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: format!("{}.values", bp.id),
                value: "[]".to_string(),
                reason: "breakpoint set must not be empty".to_string(),
            });
        }
        for &v in &bp.values {
            if ensure_finite(v, "breakpoint").is_err() {
                return Err(ValidationError::InvalidValue {
                    field: format!("{}.values", bp.id),
                    value: v.to_string(),
                    reason: "breakpoints must be finite".to_string(),
                });
            }
        }
    }

    let mut table_ids = HashSet::new();
    for table in &doc.tables {
        if !table_ids.insert(table.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: table.id.clone(),
                context: "tables".to_string(),
            });
        }
        check_axes(&table.axes, &bp_ids, &table.id)?;
    }

    let mut function_names = HashSet::new();
    for func in &doc.functions {
        if !function_names.insert(func.name.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: func.name.clone(),
                context: "functions".to_string(),
            });
        }
        for input in func.inputs.iter().chain(std::iter::once(&func.output)) {
            if !var_ids.contains(input.as_str()) {
                return Err(ValidationError::MissingReference {
                    id: input.clone(),
                    context: format!("function {}", func.name),
                });
            }
        }
        match &func.table {
            TableRef::Id(id) => {
                if !table_ids.contains(id.as_str()) {
                    return Err(ValidationError::MissingReference {
                        id: id.clone(),
                        context: format!("function {} table", func.name),
                    });
                }
            }
            TableRef::Inline { axes, .. } => check_axes(axes, &bp_ids, &func.name)?,
        }
    }

    for var in &doc.variables {
        if let Some(expr) = &var.calculation {
            check_expr(expr, &var_ids, &var.var_id)?;
        }
    }

    Ok(())
}

fn check_axes(axes: &[String], bp_ids: &HashSet<&str>, owner: &str) -> Result<(), ValidationError> {
    if axes.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: format!("{owner}.axes"),
            value: "[]".to_string(),
            reason: "a table needs at least one axis".to_string(),
        });
    }
    for axis in axes {
        if !bp_ids.contains(axis.as_str()) {
            return Err(ValidationError::MissingReference {
                id: axis.clone(),
                context: format!("{owner} axes"),
            });
        }
    }
    Ok(())
}

fn check_expr(expr: &Expr, var_ids: &HashSet<&str>, owner: &str) -> Result<(), ValidationError> {
    match expr {
        Expr::Number(_) | Expr::Const { .. } => Ok(()),
        Expr::Name(id) | Expr::Var { var: id } => {
            if var_ids.contains(id.as_str()) {
                Ok(())
            } else {
                Err(ValidationError::MissingReference {
                    id: id.clone(),
                    context: format!("calculation of {owner}"),
                })
            }
        }
        Expr::Apply { apply, args } => {
            if args.is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: format!("{owner}.calculation"),
                    value: format!("{apply:?}"),
                    reason: "operator applied to no arguments".to_string(),
                });
            }
            args.iter().try_for_each(|a| check_expr(a, var_ids, owner))
        }
    }
}
