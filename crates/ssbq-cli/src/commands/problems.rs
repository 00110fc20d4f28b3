//! List the shipped problems

use anyhow::Result;

use ssbq_mdps::Problem;

pub async fn list() -> Result<()> {
    println!("Available problems");
    println!("==================\n");
    for problem in Problem::ALL {
        let marker = if problem.has_equilibrium() { "*" } else { " " };
        println!("  {:<20}{marker} {}", problem.name(), problem.description());
    }
    println!("\n* known SSB equilibrium, reported as a distance after each run");
    Ok(())
}
