//! PORT: conflict-aware port resolution. A strategy publishes a set of
//! default container ports (e.g. node's `3000`, rails' `3000`); this module
//! decides what the *host* side actually binds to, remapping around
//! whatever is already listening.
//!
//! The suggestion algorithm is mode-independent: a requested host port that
//! is already free is used unchanged; a conflicting one is first offered
//! `base + 1000`, then a scan of `base + 1 ..= base + 100`. `Mode` only
//! governs what happens when a conflict has no suggestion: headless fails
//! fast, interactive would normally prompt (this crate's non-interactive
//! callers apply the suggestion by default either way, matching the spec's
//! stated default).

use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPair {
    pub container: u16,
    pub host: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// An interactive session: conflicts are presented with a suggestion,
    /// defaulting to applying it.
    Interactive,
    /// A headless/background session: conflicts are remapped silently;
    /// a port with no suggestion is a hard failure.
    Headless,
}

const SCAN_WINDOW: u16 = 100;
const SUGGESTION_OFFSET: u16 = 1000;

/// True if something is already listening on `port` on the loopback
/// interface. A bind-and-drop probe, same technique `cross`'s
/// `docker::MountFinder` tests use for "is this path real" checks, applied
/// here to "is this port free".
fn is_free(port: u16) -> bool {
    TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)).is_ok()
}

/// Compute a replacement host port for a conflicting `base`: `base + 1000`
/// first, then the first free port in `base + 1 ..= base + 100`.
fn suggest<F>(base: u16, free: &mut F) -> Option<u16>
where
    F: FnMut(u16) -> bool,
{
    if let Some(candidate) = base.checked_add(SUGGESTION_OFFSET) {
        if free(candidate) {
            return Some(candidate);
        }
    }

    for offset in 1..=SCAN_WINDOW {
        let candidate = base.checked_add(offset)?;
        if free(candidate) {
            return Some(candidate);
        }
    }

    None
}

/// Resolve a requested `host:container` pair, given a probe for availability
/// (injected so tests can simulate conflicts without binding real sockets).
/// `mode` is accepted for symmetry with the caller's conflict-handling
/// policy but does not change the suggestion itself. A conflict remaps only
/// `host`; `container` is carried through unchanged, so an overlay's
/// explicit remap (spec.md §3 `PortPair`) is never silently collapsed to
/// `host == container`.
pub fn resolve_pair_with<F>(desired: PortPair, _mode: Mode, mut free: F) -> Option<PortPair>
where
    F: FnMut(u16) -> bool,
{
    if free(desired.host) {
        return Some(desired);
    }

    suggest(desired.host, &mut free).map(|host| PortPair { container: desired.container, host })
}

pub fn resolve_pair(desired: PortPair, mode: Mode) -> Option<PortPair> {
    resolve_pair_with(desired, mode, is_free)
}

/// Resolve a single container port with no pre-existing host remap (the
/// common case: a strategy's own default ports, where host starts out equal
/// to container).
pub fn resolve_with<F>(container_port: u16, mode: Mode, free: F) -> Option<PortPair>
where
    F: FnMut(u16) -> bool,
{
    resolve_pair_with(PortPair { container: container_port, host: container_port }, mode, free)
}

pub fn resolve(container_port: u16, mode: Mode) -> Option<PortPair> {
    resolve_with(container_port, mode, is_free)
}

pub fn resolve_all(container_ports: &[u16], mode: Mode) -> Vec<PortPair> {
    container_ports
        .iter()
        .filter_map(|&p| resolve(p, mode))
        .collect()
}

pub fn resolve_pairs(requested: &[PortPair], mode: Mode) -> Vec<PortPair> {
    requested
        .iter()
        .filter_map(|&pair| resolve_pair(pair, mode))
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use std::collections::HashSet;

    #[test]
    fn resolve_all_preserves_input_order_with_no_conflicts() {
        let pairs = resolve_all(&[3000, 5173], Mode::Interactive);
        assert_eq!(
            pairs,
            vec![
                PortPair { container: 3000, host: 3000 },
                PortPair { container: 5173, host: 5173 },
            ]
        );
    }

    #[test]
    fn uses_the_base_port_when_nothing_conflicts() {
        let pair = resolve_with(3000, Mode::Interactive, |_| true).unwrap();
        assert_eq!(pair, PortPair { container: 3000, host: 3000 });
    }

    #[test]
    fn mode_does_not_offset_a_port_that_is_already_free() {
        let pair = resolve_with(3000, Mode::Headless, |_| true).unwrap();
        assert_eq!(pair.host, 3000);
    }

    #[test]
    fn a_conflicting_port_first_tries_the_plus_1000_suggestion() {
        let taken: HashSet<u16> = [3000].into_iter().collect();
        let pair = resolve_with(3000, Mode::Interactive, |p| !taken.contains(&p)).unwrap();
        assert_eq!(pair.host, 4000);
    }

    #[test]
    fn scans_upward_from_base_plus_one_when_the_1000_suggestion_is_also_taken() {
        let taken: HashSet<u16> = [3000, 4000, 3001, 3002].into_iter().collect();
        let pair = resolve_with(3000, Mode::Interactive, |p| !taken.contains(&p)).unwrap();
        assert_eq!(pair.host, 3003);
    }

    #[test]
    fn gives_up_after_the_scan_window() {
        let result = resolve_with(3000, Mode::Interactive, |_| false);
        assert!(result.is_none());
    }

    #[test]
    fn resolve_pair_keeps_container_fixed_while_remapping_host() {
        let desired = PortPair { container: 3000, host: 3011 };
        let pair = resolve_pair_with(desired, Mode::Interactive, |_| true).unwrap();
        assert_eq!(pair, PortPair { container: 3000, host: 3011 });
    }

    #[test]
    fn resolve_pair_remaps_only_the_conflicting_host_port() {
        let taken: HashSet<u16> = [3011].into_iter().collect();
        let desired = PortPair { container: 3000, host: 3011 };
        let pair = resolve_pair_with(desired, Mode::Interactive, |p| !taken.contains(&p)).unwrap();
        assert_eq!(pair.container, 3000);
        assert_eq!(pair.host, 4011);
    }

    #[test]
    fn headless_and_interactive_suggest_the_same_port() {
        let taken: HashSet<u16> = [3000, 4000].into_iter().collect();
        let free = |p: u16| !taken.contains(&p);
        let headless = resolve_with(3000, Mode::Headless, free).unwrap();
        let interactive = resolve_with(3000, Mode::Interactive, free).unwrap();
        assert_eq!(headless.host, interactive.host);
    }
}
