//! STRAT: the closed registry of supported project strategies and the
//! conservative, additive scoring heuristics used to rank them during
//! detection. `generic` is deliberately excluded from the scored registry:
//! it is only reachable through explicit `--strategy generic` selection,
//! per the fallback rule in spec.md §4.2.

use once_cell::sync::Lazy;

/// One entry per supported runtime stack. Field names mirror how `cross`
/// describes a `Target`: a short identifier plus the data needed to act on
/// it, kept together instead of scattered across match arms.
#[derive(Debug, Clone, Copy)]
pub struct Strategy {
    /// Stable identifier used in container names, CLI `--strategy` values,
    /// and cache-mount names. Never changes once shipped.
    pub name: &'static str,
    /// Base image reference used when no project Dockerfile overlay exists.
    pub base_image: &'static str,
    /// Named cache mount suffixes this strategy wants under
    /// `<prefix>-<hash>-<strategy>-<cache-key>` (e.g. `node_modules`).
    pub caches: &'static [&'static str],
}

pub static RAILS: Strategy = Strategy {
    name: "rails",
    base_image: "yolo/rails:latest",
    caches: &["bundle", "node_modules"],
};

pub static NODE: Strategy = Strategy {
    name: "node",
    base_image: "yolo/node:latest",
    caches: &["node_modules"],
};

pub static PYTHON: Strategy = Strategy {
    name: "python",
    base_image: "yolo/python:latest",
    caches: &["venv", "pip-cache"],
};

pub static GO: Strategy = Strategy {
    name: "go",
    base_image: "yolo/go:latest",
    caches: &["go-mod", "go-build"],
};

pub static RUST: Strategy = Strategy {
    name: "rust",
    base_image: "yolo/rust:latest",
    caches: &["cargo-registry", "target"],
};

pub static ANDROID: Strategy = Strategy {
    name: "android",
    base_image: "yolo/android:latest",
    caches: &["gradle"],
};

pub static JEKYLL: Strategy = Strategy {
    name: "jekyll",
    base_image: "yolo/jekyll:latest",
    caches: &["bundle"],
};

/// The fallback strategy. Never scored, only reachable via explicit
/// `--strategy generic`.
pub static GENERIC: Strategy = Strategy {
    name: "generic",
    base_image: "yolo/generic:latest",
    caches: &[],
};

/// The closed, scored registry: order matters only for tie-break stability
/// in tests, not for detection (detection is a max-score search, spec.md
/// §4.2).
pub static REGISTRY: Lazy<Vec<&'static Strategy>> =
    Lazy::new(|| vec![&RAILS, &NODE, &PYTHON, &GO, &RUST, &ANDROID, &JEKYLL]);

pub fn by_name(name: &str) -> Option<&'static Strategy> {
    if name == GENERIC.name {
        return Some(&GENERIC);
    }
    REGISTRY.iter().find(|s| s.name == name).copied()
}

pub fn all_names() -> Vec<&'static str> {
    REGISTRY.iter().map(|s| s.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_is_not_in_the_scored_registry() {
        assert!(!all_names().contains(&"generic"));
    }

    #[test]
    fn by_name_finds_generic_explicitly() {
        assert_eq!(by_name("generic").unwrap().name, "generic");
    }

    #[test]
    fn by_name_finds_scored_strategies() {
        assert_eq!(by_name("rust").unwrap().name, "rust");
        assert!(by_name("nonexistent").is_none());
    }

    #[test]
    fn registry_names_are_unique() {
        let names = all_names();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(names.len(), sorted.len());
    }
}
