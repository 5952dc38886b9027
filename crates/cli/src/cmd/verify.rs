//! Verify and repair the ancestor index

use crate::session::Session;
use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(session: &Session) -> Result<()> {
    let report = session.engine.verify()?;

    if session.json {
        util::print_json(&report)?;
    } else if report.is_clean() {
        println!(
            "{} {} branches checked, no violations",
            "✓".green(),
            report.branches_checked
        );
    } else {
        println!("{}", "Violations".red().bold());
        for violation in &report.violations {
            println!("  {} {}", "✗".red(), violation);
        }
        println!();
        println!(
            "{}",
            "Run `canopy repair --all` to rebuild the index from parent pointers".yellow()
        );
    }

    if !report.is_clean() {
        anyhow::bail!("{} violation(s) found", report.violations.len());
    }
    Ok(())
}

pub fn run_repair(session: &Session, id: Option<&str>, all: bool) -> Result<()> {
    let report = match id {
        Some(id) if !all => session.engine.repair(&id.into())?,
        _ => session.engine.repair_all()?,
    };

    if session.json {
        return util::print_json(&report);
    }

    let untouched = report.repaired == 0
        && report.dangling_removed == 0
        && report.requests_removed == 0
        && report.index_rows_fixed == 0
        && report.finished == 0;
    if untouched {
        println!(
            "{} {} branches checked, nothing to repair",
            "✓".green(),
            report.visited
        );
    } else {
        println!("{}", "Repair Complete".green().bold());
        println!("Branches checked:  {}", report.visited);
        println!("Branches repaired: {}", report.repaired.to_string().yellow());
        println!("Row writes:        {}", report.stats.writes());
        if report.dangling_removed > 0 {
            println!("Dangling rows:     {}", report.dangling_removed.to_string().yellow());
        }
        if report.requests_removed > 0 {
            println!("Dangling requests: {}", report.requests_removed.to_string().yellow());
        }
        if report.index_rows_fixed > 0 {
            println!("Index rows fixed:  {}", report.index_rows_fixed.to_string().yellow());
        }
        if report.finished > 0 {
            println!("Resumed ops:       {}", report.finished.to_string().yellow());
        }
    }
    Ok(())
}
