pub mod rdns;

pub use rdns::ReverseDns;

/// Sanitize a string for safe terminal display by removing control characters.
///
/// PTR records are attacker-controlled; this drops ASCII and Unicode control
/// characters that could inject terminal escape sequences.
pub(crate) fn sanitize_display(s: &str) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}
