//! Text dumps of SCoPs.
//!
//! The layout is line oriented: numbers and polyhedra on their own lines,
//! with `#` comment lines added at verbosity 1 and debug blocks at
//! verbosity 2. Output depends only on the SCoP, so two dumps of the same
//! SCoP are byte-identical.
//!
//! ```text
//! SCoP 1
//! #(
//! # Language
//! Gimple
//! # Context (
//! [N] -> {  : N - 1 >= 0 }
//! # )
//! # Parameter names are provided
//! 1
//! # Parameter names
//! N
//! # Number of statements
//! 1
//! ...
//! #)
//! ```

use crate::analysis::DependenceSet;
use crate::ir::{Pbb, Pdr, PdrKind, Region, ScheduleState, Scop};
use std::fmt::{self, Write};

/// Print the domain of a statement.
pub fn print_pbb_domain(out: &mut impl Write, pbb: &Pbb, _verbosity: u8) -> fmt::Result {
    writeln!(out, "{}", pbb.domain)
}

pub fn print_iteration_domain(out: &mut impl Write, pbb: &Pbb, verbosity: u8) -> fmt::Result {
    print_pbb_domain(out, pbb, verbosity)
}

/// Print the domains of every statement, in statement order.
pub fn print_iteration_domains(out: &mut impl Write, scop: &Scop, verbosity: u8) -> fmt::Result {
    for pbb in &scop.statements {
        print_iteration_domain(out, pbb, verbosity)?;
    }
    Ok(())
}

fn print_data_ref(out: &mut impl Write, region: &Region, pdr: &Pdr) -> fmt::Result {
    writeln!(out, "#(Data Ref: ")?;
    match region.data_ref(pdr.data_ref) {
        Some(dr) => {
            writeln!(out, "#  bb: {} ", dr.bb_index)?;
            writeln!(out, "#  ref: {};", dr.text)?;
            writeln!(out, "#  base_object: {};", dr.base)?;
            writeln!(out, "#  alias_set: {}", dr.alias_set)?;
        }
        None => writeln!(out, "#  ref: {} (unknown);", pdr.data_ref)?,
    }
    writeln!(out, "#)")
}

/// Print one data reference: its access relation and subscript bounds.
pub fn print_pdr(out: &mut impl Write, region: &Region, pdr: &Pdr, verbosity: u8) -> fmt::Result {
    if verbosity > 1 {
        writeln!(out, "# {} ({} ", pdr.id, pdr.kind)?;
        print_data_ref(out, region, pdr)?;
    }
    if verbosity > 0 {
        writeln!(out, "# data accesses (")?;
        writeln!(out, "{}", pdr.accesses)?;
        writeln!(out, "{}", pdr.subscript_sizes)?;
        writeln!(out, "#)")?;
    }
    if verbosity > 1 {
        writeln!(out, "#)")?;
    }
    Ok(())
}

/// Print the data references of a statement, reads first, then writes.
pub fn print_pdrs(out: &mut impl Write, region: &Region, pbb: &Pbb, verbosity: u8) -> fmt::Result {
    if pbb.drs.is_empty() {
        if verbosity > 0 {
            writeln!(out, "# Access informations are not provided")?;
        }
        return writeln!(out, "0");
    }

    if verbosity > 1 {
        writeln!(out, "# Data references (")?;
    }
    if verbosity > 0 {
        writeln!(out, "# Access informations are provided")?;
    }
    writeln!(out, "1")?;

    let sections: [(&str, &str, bool); 2] = [
        ("# Read data references (", "# Read access informations", true),
        ("# Write data references (", "# Write access informations", false),
    ];
    for (open, title, reads) in sections {
        if verbosity > 1 {
            writeln!(out, "{}", open)?;
        }
        if verbosity > 0 {
            writeln!(out, "{}", title)?;
        }
        let selected: Vec<&Pdr> = pbb.drs.iter()
            .filter(|pdr| (pdr.kind == PdrKind::Read) == reads)
            .collect();
        writeln!(out, "{}", selected.len())?;
        for pdr in selected {
            print_pdr(out, region, pdr, verbosity)?;
        }
        if verbosity > 1 {
            writeln!(out, "#)")?;
        }
    }

    if verbosity > 1 {
        writeln!(out, "#)")?;
    }
    Ok(())
}

fn print_pbb_body(out: &mut impl Write, pbb: &Pbb, verbosity: u8) -> fmt::Result {
    if verbosity > 1 {
        writeln!(out, "# Body (")?;
    }
    match &pbb.black_box.body {
        None => {
            if verbosity > 0 {
                writeln!(out, "# Statement body is not provided")?;
            }
            writeln!(out, "0")?;
        }
        Some(body) => {
            if verbosity > 0 {
                writeln!(out, "# Statement body is provided")?;
            }
            writeln!(out, "1")?;
            if verbosity > 0 {
                writeln!(out, "# Original iterator names\n# Iterator names are not provided yet.")?;
                writeln!(out, "# Statement body")?;
            }
            writeln!(out, "{{")?;
            writeln!(out, "{}", body)?;
            writeln!(out, "}}")?;
        }
    }
    if verbosity > 1 {
        writeln!(out, "#)")?;
    }
    Ok(())
}

fn print_guards(out: &mut impl Write, what: &str, bb: u32, lines: &[String]) -> fmt::Result {
    if lines.is_empty() {
        return Ok(());
    }
    writeln!(out, "# {} bb_{} (", what, bb)?;
    for line in lines {
        writeln!(out, "# {}", line)?;
    }
    writeln!(out, "#)")
}

/// Print a statement: domain, data references and body.
pub fn print_pbb(out: &mut impl Write, region: &Region, pbb: &Pbb, verbosity: u8) -> fmt::Result {
    if verbosity > 1 {
        writeln!(out, "# pbb_{} (", pbb.index())?;
        print_guards(out, "conditions", pbb.index(), &pbb.black_box.conditions)?;
        print_guards(out, "cases", pbb.index(), &pbb.black_box.cases)?;
    }

    print_pbb_domain(out, pbb, verbosity)?;
    print_pdrs(out, region, pbb, verbosity)?;
    print_pbb_body(out, pbb, verbosity)?;

    if verbosity > 1 {
        writeln!(out, "#)")?;
    }
    Ok(())
}

/// Print the parameter names, space separated.
pub fn print_scop_params(out: &mut impl Write, scop: &Scop, verbosity: u8) -> fmt::Result {
    if verbosity > 1 {
        writeln!(out, "# parameters (")?;
    }
    if scop.nb_params() > 0 {
        if verbosity > 0 {
            writeln!(out, "# Parameter names are provided")?;
        }
        writeln!(out, "1")?;
        if verbosity > 0 {
            writeln!(out, "# Parameter names")?;
        }
    } else {
        if verbosity > 0 {
            writeln!(out, "# Parameter names are not provided")?;
        }
        writeln!(out, "0")?;
    }
    for name in scop.param_names() {
        write!(out, "{} ", name)?;
    }
    writeln!(out)?;
    if verbosity > 1 {
        writeln!(out, "#)")?;
    }
    Ok(())
}

pub fn print_scop_context(out: &mut impl Write, scop: &Scop, verbosity: u8) -> fmt::Result {
    if verbosity > 0 {
        writeln!(out, "# Context (")?;
    }
    writeln!(out, "{}", scop.param_context)?;
    if verbosity > 0 {
        writeln!(out, "# )")?;
    }
    Ok(())
}

/// Print a whole SCoP.
pub fn print_scop(out: &mut impl Write, scop: &Scop, verbosity: u8) -> fmt::Result {
    writeln!(out, "SCoP 1\n#(")?;
    writeln!(out, "# Language\nGimple")?;
    print_scop_context(out, scop, verbosity)?;
    print_scop_params(out, scop, verbosity)?;

    if verbosity > 0 {
        writeln!(out, "# Number of statements")?;
    }
    writeln!(out, "{}", scop.nb_statements())?;

    for pbb in &scop.statements {
        print_pbb(out, &scop.region, pbb, verbosity)?;
    }
    writeln!(out, "#)")
}

pub fn scop_to_string(scop: &Scop, verbosity: u8) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = print_scop(&mut out, scop, verbosity);
    out
}

/// Print the twelve dependence relations, one block per kind.
pub fn print_dependences(out: &mut impl Write, deps: &DependenceSet) -> fmt::Result {
    writeln!(out, "# Dependences (")?;
    for (kind, map) in deps.iter() {
        writeln!(out, "{} {}", kind, map.len())?;
        for ((s, t), rel) in map {
            writeln!(out, "# {} -> {}", s, t)?;
            writeln!(out, "{}", rel)?;
        }
    }
    writeln!(out, "#)")
}

/// Print each statement's schedule state and the scheduling decision.
pub fn print_schedules(out: &mut impl Write, scop: &Scop) -> fmt::Result {
    writeln!(out, "# Schedules (")?;
    for pbb in &scop.statements {
        let state = match &pbb.state {
            ScheduleState::Original => "original",
            ScheduleState::Proposed { .. } => "proposed",
            ScheduleState::Committed { .. } => "committed",
        };
        writeln!(out, "# {} {}", pbb.name(), state)?;
        writeln!(out, "{}", pbb.effective_schedule())?;
    }
    if let Some(info) = &scop.schedule_info {
        writeln!(out, "# policy {} permutation {}", info.policy, info.permutation)?;
        let flags: Vec<&str> = info.carried.iter().map(|&c| if c { "1" } else { "0" }).collect();
        writeln!(out, "# carried {}", flags.join(" "))?;
    }
    writeln!(out, "#)")
}
