//! DET: project-type auto-detection. Shallow detection inspects only the
//! worktree root; deep detection (opt-in via `YOLO_DETECT_DEEP` or
//! `--detect`) additionally scans one level of subdirectories, skipping
//! hidden directories and known noise (`node_modules`, `vendor`, `tmp`,
//! `log`, `public`, `.bundle`) so monorepos with a nested app still detect
//! correctly without walking dependency trees.
//!
//! Scoring is additive with a ceiling of 100. A single bare manifest lands
//! well under the auto-select threshold (80); a project carrying its full
//! strong-signal set (manifest, entrypoint, version file, ...) clears it.
//! `generic` never appears here — it has no heuristic and is reachable only
//! through explicit selection.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

use crate::strategy::{self, Strategy};

/// Matches a `gem "rails"` or `gem 'rails'` declaration, tolerating the
/// version-constraint arguments real Gemfiles append after the name.
static RAILS_GEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"gem\s+["']rails["']"#).unwrap());
/// Matches a `gem "jekyll"` declaration the same way.
static JEKYLL_GEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"gem\s+["']jekyll["']"#).unwrap());
/// Matches an Android Gradle plugin reference in a build file, either the
/// legacy `apply plugin` form or the modern plugins-block id.
static ANDROID_PLUGIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"com\.android\.(application|library)"#).unwrap());

const SKIP_DIRS: &[&str] = &["node_modules", "vendor", "tmp", "log", "public", ".bundle"];

/// How deep an `AndroidManifest.xml` search descends under a candidate
/// directory (spec.md §4.2's "up to 5 levels").
const ANDROID_MANIFEST_SCAN_DEPTH: usize = 5;

/// Points awarded for the primary manifest/marker of a strategy.
const PRIMARY: i32 = 40;
/// Points awarded for each supporting signal (entrypoint, version file, ...).
const SUPPORTING: i32 = 20;
/// Penalty applied to node/jekyll when a rails manifest is also present,
/// per spec.md §4.2's negative-signal column.
const RAILS_PRESENT_PENALTY: i32 = 50;
/// Weak fallback when a Ruby project carries neither a rails nor a jekyll
/// marker; most such Gemfiles still belong to rails apps in this corpus.
const WEAK_RUBY_FALLBACK: i32 = 10;

const CONFIDENCE_CEILING: u32 = 100;

/// A single strategy's detection result: its confidence and the concrete
/// signals that produced it (spec.md §3 `DetectionResult`).
#[derive(Debug, Clone)]
pub struct Detection {
    pub strategy: &'static Strategy,
    pub confidence: u32,
    pub evidence: Vec<String>,
}

type Scores = std::collections::HashMap<&'static str, (i32, Vec<String>)>;

/// Detect from the worktree root only, returning the single best result.
pub fn detect(root: &Path) -> Option<Detection> {
    detect_all(root).into_iter().next()
}

/// Detect from the worktree root, then one level of non-hidden,
/// non-skip-listed subdirectories, summing scores so a strongly-signalled
/// nested app can still outrank a weak root-level signal. Returns the
/// single best result.
pub fn detect_deep(root: &Path) -> Option<Detection> {
    detect_all_deep(root).into_iter().next()
}

/// All non-zero shallow results, sorted by confidence descending. Used by
/// the selection policy's auto-select gate and its detect-deep menu.
pub fn detect_all(root: &Path) -> Vec<Detection> {
    results_from(score_dir(root))
}

/// All non-zero deep results, sorted by confidence descending.
pub fn detect_all_deep(root: &Path) -> Vec<Detection> {
    let mut totals = score_dir(root);

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            !name.starts_with('.') && !SKIP_DIRS.contains(&name.as_str())
        });

    for entry in walker.flatten() {
        if !entry.file_type().is_dir() {
            continue;
        }
        for (strat, (score, evidence)) in score_dir(entry.path()) {
            let agg = totals.entry(strat).or_insert((0, Vec::new()));
            agg.0 += score;
            agg.1.extend(evidence);
        }
    }

    results_from(totals)
}

fn results_from(scores: Scores) -> Vec<Detection> {
    let mut out: Vec<Detection> = scores
        .into_iter()
        .filter(|(_, (score, _))| *score > 0)
        .filter_map(|(name, (score, evidence))| {
            let confidence = (score.max(0) as u32).min(CONFIDENCE_CEILING);
            strategy::by_name(name).map(|strategy| Detection { strategy, confidence, evidence })
        })
        .collect();
    out.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    out
}

fn exists(dir: &Path, name: &str) -> bool {
    dir.join(name).exists()
}

fn is_dir(dir: &Path, name: &str) -> bool {
    dir.join(name).is_dir()
}

fn matches(dir: &Path, name: &str, re: &Regex) -> bool {
    fs::read_to_string(dir.join(name))
        .map(|contents| re.is_match(&contents))
        .unwrap_or(false)
}

fn any_matches(dir: &Path, name: &str, re: &Regex) -> bool {
    matches(dir, name, re)
}

/// `AndroidManifest.xml` anywhere within `dir`, up to
/// `ANDROID_MANIFEST_SCAN_DEPTH` levels down.
fn android_manifest_nearby(dir: &Path) -> bool {
    WalkDir::new(dir)
        .max_depth(ANDROID_MANIFEST_SCAN_DEPTH)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| e.file_name() == "AndroidManifest.xml")
}

fn add(scores: &mut Scores, strat: &'static str, amount: i32, evidence: &str) {
    let entry = scores.entry(strat).or_insert((0, Vec::new()));
    entry.0 += amount;
    if amount > 0 {
        entry.1.push(evidence.to_string());
    }
}

/// Additive per-strategy scores for a single directory. Conservative by
/// design: a bare manifest alone never clears the auto-select threshold, but
/// a project carrying its full strong-signal set (manifest, entrypoint,
/// version file, ...) does, per spec.md §4.2 and §8's boundary property.
fn score_dir(dir: &Path) -> Scores {
    let mut scores: Scores = std::collections::HashMap::new();

    score_rust(dir, &mut scores);
    score_go(dir, &mut scores);
    score_node(dir, &mut scores);
    score_python(dir, &mut scores);
    score_android(dir, &mut scores);
    score_ruby(dir, &mut scores);

    if has_rails_manifest(dir) {
        add(&mut scores, "node", -RAILS_PRESENT_PENALTY, "");
        add(&mut scores, "jekyll", -RAILS_PRESENT_PENALTY, "");
    }

    scores
}

fn has_rails_manifest(dir: &Path) -> bool {
    exists(dir, "Gemfile")
        && (any_matches(dir, "Gemfile", &RAILS_GEM_RE) || exists(dir, "config/application.rb"))
}

fn score_rust(dir: &Path, scores: &mut Scores) {
    if exists(dir, "Cargo.toml") {
        add(scores, "rust", PRIMARY, "Cargo.toml");
    }
    if exists(dir, "Cargo.lock") {
        add(scores, "rust", SUPPORTING, "Cargo.lock");
    }
    if exists(dir, "src/main.rs") || exists(dir, "src/lib.rs") {
        add(scores, "rust", SUPPORTING, "src/main.rs or src/lib.rs");
    }
}

fn score_go(dir: &Path, scores: &mut Scores) {
    if exists(dir, "go.mod") {
        add(scores, "go", PRIMARY, "go.mod");
    }
    if exists(dir, "main.go") {
        add(scores, "go", SUPPORTING, "main.go");
    }
    if is_dir(dir, "cmd") {
        add(scores, "go", SUPPORTING, "cmd/");
    }
}

fn score_node(dir: &Path, scores: &mut Scores) {
    if exists(dir, "package.json") {
        add(scores, "node", PRIMARY, "package.json");
    }
    if exists(dir, "package-lock.json") || exists(dir, "yarn.lock") || exists(dir, "pnpm-lock.yaml") {
        add(scores, "node", SUPPORTING, "lockfile");
    }
    if exists(dir, "tsconfig.json") {
        add(scores, "node", SUPPORTING, "tsconfig.json");
    }
    if exists(dir, ".nvmrc") {
        add(scores, "node", SUPPORTING, ".nvmrc");
    }
    let framework_configs =
        ["next.config.js", "next.config.mjs", "vite.config.js", "vite.config.ts", "nuxt.config.js", "angular.json"];
    if framework_configs.iter().any(|f| exists(dir, f)) {
        add(scores, "node", SUPPORTING, "framework config file");
    }
}

fn score_python(dir: &Path, scores: &mut Scores) {
    if exists(dir, "pyproject.toml") || exists(dir, "requirements.txt") || exists(dir, "Pipfile") {
        add(scores, "python", PRIMARY, "pyproject.toml/requirements.txt/Pipfile");
    }
    if exists(dir, ".python-version") {
        add(scores, "python", SUPPORTING, ".python-version");
    }
    if exists(dir, "poetry.lock") || exists(dir, "Pipfile.lock") {
        add(scores, "python", SUPPORTING, "lockfile");
    }
}

fn score_android(dir: &Path, scores: &mut Scores) {
    let has_gradle_manifest =
        exists(dir, "build.gradle") || exists(dir, "build.gradle.kts") || exists(dir, "settings.gradle");
    if has_gradle_manifest {
        add(scores, "android", PRIMARY, "gradle manifest");
    }
    if android_manifest_nearby(dir) {
        add(scores, "android", SUPPORTING, "AndroidManifest.xml");
    }
    let plugin_referenced = any_matches(dir, "build.gradle", &ANDROID_PLUGIN_RE)
        || any_matches(dir, "build.gradle.kts", &ANDROID_PLUGIN_RE);
    if plugin_referenced {
        add(scores, "android", SUPPORTING, "android gradle plugin");
    }
    if exists(dir, "gradlew") {
        add(scores, "android", SUPPORTING, "gradlew");
    }
}

fn score_ruby(dir: &Path, scores: &mut Scores) {
    if exists(dir, "Gemfile") {
        if any_matches(dir, "Gemfile", &RAILS_GEM_RE) {
            add(scores, "rails", PRIMARY, "Gemfile-with-rails");
        }
        if exists(dir, "config/application.rb") {
            add(scores, "rails", SUPPORTING, "application.rb");
        }
        if exists(dir, ".ruby-version") {
            add(scores, "rails", SUPPORTING, ".ruby-version");
        }
        if exists(dir, "bin/rails") {
            add(scores, "rails", SUPPORTING, "bin/rails");
        }

        if any_matches(dir, "Gemfile", &JEKYLL_GEM_RE) {
            add(scores, "jekyll", SUPPORTING, "Gemfile-with-jekyll");
        }

        let has_rails_signal = any_matches(dir, "Gemfile", &RAILS_GEM_RE) || exists(dir, "config/application.rb");
        let has_jekyll_signal = any_matches(dir, "Gemfile", &JEKYLL_GEM_RE) || exists(dir, "_config.yml");
        if !has_rails_signal && !has_jekyll_signal {
            add(scores, "rails", WEAK_RUBY_FALLBACK, "Gemfile");
        }
    }

    if exists(dir, "_config.yml") {
        add(scores, "jekyll", PRIMARY, "_config.yml");
    }
    if is_dir(dir, "_posts") || is_dir(dir, "_layouts") {
        add(scores, "jekyll", SUPPORTING, "_posts or _layouts");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::tempdir;

    #[test]
    fn detects_rust_from_cargo_toml() {
        let dir = tempdir().unwrap();
        stdfs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        let d = detect(dir.path()).unwrap();
        assert_eq!(d.strategy.name, "rust");
    }

    #[test]
    fn prefers_stronger_signal_when_multiple_markers_present() {
        let dir = tempdir().unwrap();
        stdfs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        stdfs::write(dir.path().join("Cargo.lock"), "").unwrap();
        stdfs::write(dir.path().join("package.json"), "{}").unwrap();
        let d = detect(dir.path()).unwrap();
        // rust carries a manifest and a lockfile (60) against node's bare
        // manifest (40).
        assert_eq!(d.strategy.name, "rust");
    }

    #[test]
    fn disambiguates_rails_from_jekyll_via_content() {
        let dir = tempdir().unwrap();
        stdfs::write(dir.path().join("Gemfile"), "gem 'jekyll'").unwrap();
        stdfs::write(dir.path().join("_config.yml"), "title: site").unwrap();
        let d = detect(dir.path()).unwrap();
        assert_eq!(d.strategy.name, "jekyll");
    }

    #[test]
    fn no_markers_yields_no_detection() {
        let dir = tempdir().unwrap();
        assert!(detect(dir.path()).is_none());
    }

    #[test]
    fn deep_detection_finds_nested_app_and_skips_node_modules() {
        let dir = tempdir().unwrap();
        stdfs::create_dir_all(dir.path().join("node_modules/some-pkg")).unwrap();
        stdfs::write(dir.path().join("node_modules/some-pkg/package.json"), "{}").unwrap();
        stdfs::create_dir_all(dir.path().join("app")).unwrap();
        stdfs::write(dir.path().join("app/go.mod"), "module app").unwrap();

        let shallow = detect(dir.path());
        assert!(shallow.is_none());

        let deep = detect_deep(dir.path()).unwrap();
        assert_eq!(deep.strategy.name, "go");
    }

    #[test]
    fn generic_is_never_returned_by_detection() {
        let dir = tempdir().unwrap();
        stdfs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        let d = detect(dir.path()).unwrap();
        assert_ne!(d.strategy.name, "generic");
    }

    #[test]
    fn bare_manifest_alone_stays_below_the_auto_select_threshold() {
        let dir = tempdir().unwrap();
        stdfs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        let d = detect(dir.path()).unwrap();
        assert!(d.confidence < 80);
    }

    #[test]
    fn full_rails_signal_set_clears_the_auto_select_threshold() {
        let dir = tempdir().unwrap();
        stdfs::write(dir.path().join("Gemfile"), "gem 'rails'").unwrap();
        stdfs::create_dir_all(dir.path().join("config")).unwrap();
        stdfs::write(dir.path().join("config/application.rb"), "").unwrap();
        stdfs::write(dir.path().join(".ruby-version"), "3.3.0").unwrap();
        stdfs::create_dir_all(dir.path().join("bin")).unwrap();
        stdfs::write(dir.path().join("bin/rails"), "").unwrap();

        let d = detect(dir.path()).unwrap();
        assert_eq!(d.strategy.name, "rails");
        assert!(d.confidence >= 80, "confidence was {}", d.confidence);
        assert!(d.evidence.iter().any(|e| e == "Gemfile-with-rails"));
        assert!(d.evidence.iter().any(|e| e == "application.rb"));
    }

    #[test]
    fn rails_manifest_present_suppresses_a_coincidental_node_score() {
        let dir = tempdir().unwrap();
        stdfs::write(dir.path().join("Gemfile"), "gem 'rails'").unwrap();
        stdfs::create_dir_all(dir.path().join("config")).unwrap();
        stdfs::write(dir.path().join("config/application.rb"), "").unwrap();
        stdfs::write(dir.path().join(".ruby-version"), "3.3.0").unwrap();
        stdfs::create_dir_all(dir.path().join("bin")).unwrap();
        stdfs::write(dir.path().join("bin/rails"), "").unwrap();
        stdfs::write(dir.path().join("package.json"), "{}").unwrap();

        let all = detect_all(dir.path());
        let rails = all.iter().find(|d| d.strategy.name == "rails").unwrap();
        assert!(rails.confidence >= 80);
        assert!(all.iter().find(|d| d.strategy.name == "node").is_none());
    }

    #[test]
    fn confidence_never_exceeds_the_ceiling() {
        let dir = tempdir().unwrap();
        stdfs::write(dir.path().join("Gemfile"), "gem 'rails'").unwrap();
        stdfs::create_dir_all(dir.path().join("config")).unwrap();
        stdfs::write(dir.path().join("config/application.rb"), "").unwrap();
        stdfs::write(dir.path().join(".ruby-version"), "3.3.0").unwrap();
        stdfs::create_dir_all(dir.path().join("bin")).unwrap();
        stdfs::write(dir.path().join("bin/rails"), "").unwrap();

        let d = detect(dir.path()).unwrap();
        assert!(d.confidence <= 100);
    }
}
