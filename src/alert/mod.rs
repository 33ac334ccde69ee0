/// Risk evaluation for incoming measurements.
///
/// Submodules:
/// - `risk` — water level / rain / civil-defense rule producing a `RiskLevel`.

pub mod risk;
