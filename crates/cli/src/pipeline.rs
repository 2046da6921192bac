// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The built-in bacterial-isolate pipeline: targets and dependency rules.
//!
//! Params flag which inputs the user provided (reads, contigs, a species
//! name); checkpoints mark data that can come either from the user or
//! from a service (contigs from the assembler, species from the species
//! finder); services are the external analysis programs; user targets are
//! the goals that can be requested on the command line.

use isoflow_core::target::{all, fst, one, oif, opt, Clause, RuleBook, RuleError};
use isoflow_core::Target;

pub mod params {
    use isoflow_core::Target;

    pub const READS: Target = Target::Param("reads");
    pub const CONTIGS: Target = Target::Param("contigs");
    pub const SPECIES: Target = Target::Param("species");
}

pub mod checkpoints {
    use isoflow_core::Target;

    /// Contigs are available, either as input or from assembly.
    pub const CONTIGS: Target = Target::Checkpoint("contigs");
    /// Species is known, either from input or from a service.
    pub const SPECIES: Target = Target::Checkpoint("species");
}

pub mod services {
    use isoflow_core::Target;

    pub const ASSEMBLER: Target = Target::Service("Assembler");
    pub const CONTIGS_METRICS: Target = Target::Service("ContigsMetrics");
    pub const READS_METRICS: Target = Target::Service("ReadsMetrics");
    pub const SPECIES_FINDER: Target = Target::Service("SpeciesFinder");
    pub const MLST_FINDER: Target = Target::Service("MLSTFinder");
    pub const RES_FINDER: Target = Target::Service("ResFinder");
    pub const VIR_FINDER: Target = Target::Service("VirulenceFinder");
    pub const PLASMID_FINDER: Target = Target::Service("PlasmidFinder");
}

pub mod user_targets {
    use isoflow_core::Target;

    pub const METRICS: Target = Target::UserTarget("metrics");
    pub const ASSEMBLY: Target = Target::UserTarget("assembly");
    pub const SPECIES: Target = Target::UserTarget("species");
    pub const MLST: Target = Target::UserTarget("mlst");
    pub const RESISTANCE: Target = Target::UserTarget("resistance");
    pub const VIRULENCE: Target = Target::UserTarget("virulence");
    pub const PLASMIDS: Target = Target::UserTarget("plasmids");
    pub const DEFAULT: Target = Target::UserTarget("DEFAULT");
    pub const FULL: Target = Target::UserTarget("FULL");
}

pub const PARAMS: &[Target] = &[params::READS, params::CONTIGS, params::SPECIES];

pub const SERVICES: &[Target] = &[
    services::ASSEMBLER,
    services::CONTIGS_METRICS,
    services::READS_METRICS,
    services::SPECIES_FINDER,
    services::MLST_FINDER,
    services::RES_FINDER,
    services::VIR_FINDER,
    services::PLASMID_FINDER,
];

pub const USER_TARGETS: &[Target] = &[
    user_targets::METRICS,
    user_targets::ASSEMBLY,
    user_targets::SPECIES,
    user_targets::MLST,
    user_targets::RESISTANCE,
    user_targets::VIRULENCE,
    user_targets::PLASMIDS,
    user_targets::DEFAULT,
    user_targets::FULL,
];

/// The dependency rules of the pipeline.
pub fn rule_book() -> Result<RuleBook, RuleError> {
    use self::checkpoints as cp;
    use self::services as svc;
    use self::user_targets as ut;

    let book = RuleBook::new(vec![
        (ut::METRICS, all([opt(svc::CONTIGS_METRICS), opt(svc::READS_METRICS)])),
        (ut::ASSEMBLY, Clause::from(svc::ASSEMBLER)),
        (ut::SPECIES, Clause::from(cp::SPECIES)),
        (ut::MLST, Clause::from(svc::MLST_FINDER)),
        (ut::RESISTANCE, opt(svc::RES_FINDER)),
        (ut::VIRULENCE, Clause::from(svc::VIR_FINDER)),
        (ut::PLASMIDS, Clause::from(svc::PLASMID_FINDER)),
        // Everything in DEFAULT is optional so the pipeline runs to the
        // end even when one branch fails.
        (
            ut::DEFAULT,
            all([
                opt(ut::METRICS),
                opt(ut::SPECIES),
                opt(ut::MLST),
                opt(ut::RESISTANCE),
                opt(ut::VIRULENCE),
            ]),
        ),
        (
            ut::FULL,
            all([Clause::from(ut::DEFAULT), opt(cp::CONTIGS), opt(ut::PLASMIDS)]),
        ),
        (svc::CONTIGS_METRICS, oif(cp::CONTIGS)),
        (svc::READS_METRICS, oif(params::READS)),
        (svc::ASSEMBLER, Clause::from(params::READS)),
        (svc::SPECIES_FINDER, fst([Clause::from(params::READS), Clause::from(cp::CONTIGS)])),
        (
            svc::MLST_FINDER,
            all([
                Clause::from(cp::SPECIES),
                one([Clause::from(params::READS), Clause::from(cp::CONTIGS)]),
            ]),
        ),
        (svc::RES_FINDER, fst([Clause::from(params::READS), Clause::from(cp::CONTIGS)])),
        (
            svc::VIR_FINDER,
            all([
                opt(ut::SPECIES),
                fst([Clause::from(params::READS), Clause::from(cp::CONTIGS)]),
            ]),
        ),
        (svc::PLASMID_FINDER, one([Clause::from(params::READS), Clause::from(cp::CONTIGS)])),
        (
            cp::CONTIGS,
            one([Clause::from(params::CONTIGS), Clause::from(svc::ASSEMBLER)]),
        ),
        (
            cp::SPECIES,
            one([Clause::from(params::SPECIES), Clause::from(svc::SPECIES_FINDER)]),
        ),
    ])?;
    let checkpoints = [cp::CONTIGS, cp::SPECIES];
    book.check_complete(SERVICES.iter().chain(USER_TARGETS).chain(checkpoints.iter()))?;
    Ok(book)
}

/// Exact lookup of a param by its identifier.
pub fn find_param(name: &str) -> Option<Target> {
    PARAMS.iter().find(|t| t.name() == name).copied()
}

/// Exact lookup of a user target by its identifier.
pub fn find_user_target(name: &str) -> Option<Target> {
    USER_TARGETS.iter().find(|t| t.name() == name).copied()
}

/// Lookup of a service or user target, for exclusions.
pub fn find_excludable(name: &str) -> Option<Target> {
    SERVICES
        .iter()
        .chain(USER_TARGETS)
        .find(|t| t.name() == name)
        .copied()
}

/// Prefix-unique lookup of a service: an exact identifier always wins,
/// otherwise the prefix must select exactly one service.
pub fn find_service_prefix(prefix: &str) -> Option<Target> {
    if let Some(exact) = SERVICES.iter().find(|t| t.name() == prefix) {
        return Some(*exact);
    }
    let mut matches = SERVICES.iter().filter(|t| t.name().starts_with(prefix));
    match (matches.next(), matches.next()) {
        (Some(service), None) => Some(*service),
        _ => None,
    }
}

/// Comma-split and flatten repeatable CLI options.
pub fn split_names(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
