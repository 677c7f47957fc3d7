//! PDG particle id to electric charge lookup.

use std::collections::HashMap;

/// Charges in units of e for the particle species seen in simulation.
const CHARGE_TABLE: &[(i32, f64)] = &[
    // Gauge bosons
    (21, 0.0),
    (22, 0.0),
    (23, 0.0),
    (24, 1.0),
    (-24, -1.0),
    // Leptons
    (11, -1.0),
    (-11, 1.0),
    (12, 0.0),
    (-12, 0.0),
    (13, -1.0),
    (-13, 1.0),
    (14, 0.0),
    (-14, 0.0),
    (15, -1.0),
    (-15, 1.0),
    (16, 0.0),
    (-16, 0.0),
    // Quarks
    (1, -1.0 / 3.0),
    (-1, 1.0 / 3.0),
    (2, 2.0 / 3.0),
    (-2, -2.0 / 3.0),
    (3, -1.0 / 3.0),
    (-3, 1.0 / 3.0),
    (4, 2.0 / 3.0),
    (-4, -2.0 / 3.0),
    (5, -1.0 / 3.0),
    (-5, 1.0 / 3.0),
    (6, 2.0 / 3.0),
    (-6, -2.0 / 3.0),
    // Light mesons
    (111, 0.0),
    (211, 1.0),
    (-211, -1.0),
    (113, 0.0),
    (213, 1.0),
    (-213, -1.0),
    (221, 0.0),
    (331, 0.0),
    (130, 0.0),
    (310, 0.0),
    (311, 0.0),
    (-311, 0.0),
    (321, 1.0),
    (-321, -1.0),
    // Charmed mesons
    (411, 1.0),
    (-411, -1.0),
    (421, 0.0),
    (-421, 0.0),
    // Bottom mesons
    (511, 0.0),
    (-511, 0.0),
    (521, 1.0),
    (-521, -1.0),
    // Baryons
    (2212, 1.0),
    (-2212, -1.0),
    (2112, 0.0),
    (-2112, 0.0),
    (3122, 0.0),
    (-3122, 0.0),
    (3222, 1.0),
    (-3222, -1.0),
    (3212, 0.0),
    (-3212, 0.0),
    (3112, -1.0),
    (-3112, 1.0),
    (3312, -1.0),
    (-3312, 1.0),
    (3322, 0.0),
    (-3322, 0.0),
];

/// Immutable charge lookup, built once and shared by reference.
#[derive(Debug, Clone)]
pub struct ChargeRegistry {
    charges: HashMap<i32, f64>,
}

impl Default for ChargeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChargeRegistry {
    /// Builds the registry from the standard table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            charges: CHARGE_TABLE.iter().copied().collect(),
        }
    }

    /// Builds a registry with additional species.
    #[must_use]
    pub fn with_extra<I: IntoIterator<Item = (i32, f64)>>(extra: I) -> Self {
        let mut registry = Self::new();
        registry.charges.extend(extra);
        registry
    }

    /// Charge of a species; antiparticles of known ids resolve by negation.
    #[must_use]
    pub fn charge(&self, pdg_id: i32) -> Option<f64> {
        if let Some(&charge) = self.charges.get(&pdg_id) {
            return Some(charge);
        }
        if pdg_id < 0 {
            return self.charges.get(&-pdg_id).map(|c| -c);
        }
        None
    }

    /// Charge with a fallback for unknown species.
    #[must_use]
    pub fn charge_or(&self, pdg_id: i32, default: f64) -> f64 {
        self.charge(pdg_id).unwrap_or(default)
    }

    /// Number of registered species.
    #[must_use]
    pub fn len(&self) -> usize {
        self.charges.len()
    }

    /// Returns true if no species are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.charges.is_empty()
    }
}
