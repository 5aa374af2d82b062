use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base16_builder::config::Settings;
use base16_builder::error::{BuilderError, Result};
use base16_builder::pipeline::CancellationToken;
use base16_builder::source::{list_cached, RepoSync};
use base16_builder::{build, invoke, BuildRequest, Invocation};
use walkdir::WalkDir;

const SCHEMES: &str = "https://example.test/schemes-source";
const TEMPLATES: &str = "https://example.test/templates-source";

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

struct Remote {
    revision: u32,
    files: HashMap<String, String>,
}

/// In-memory stand-in for git. Every fixture directory under
/// `tests/fixtures/remotes` is served at `https://example.test/<dir>`.
#[derive(Default)]
struct FakeRemotes {
    remotes: Mutex<HashMap<String, Remote>>,
    failing: Mutex<HashSet<String>>,
    clones: AtomicUsize,
    pulls: AtomicUsize,
}

impl FakeRemotes {
    fn from_fixtures() -> Arc<Self> {
        let root = fixture_path("remotes");
        let fake = Self::default();
        {
            let mut remotes = fake.remotes.lock().unwrap();
            for dir in std::fs::read_dir(&root).unwrap() {
                let dir = dir.unwrap().path();
                let name = dir.file_name().unwrap().to_string_lossy().into_owned();
                let files = WalkDir::new(&dir)
                    .into_iter()
                    .map(|e| e.unwrap())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| {
                        let rel = e.path().strip_prefix(&dir).unwrap();
                        (
                            rel.to_string_lossy().replace('\\', "/"),
                            std::fs::read_to_string(e.path()).unwrap(),
                        )
                    })
                    .collect();
                remotes.insert(
                    format!("https://example.test/{name}"),
                    Remote { revision: 1, files },
                );
            }
        }
        Arc::new(fake)
    }

    /// Write a file upstream and advance the revision.
    fn commit(&self, url: &str, path: &str, content: &str) {
        let mut remotes = self.remotes.lock().unwrap();
        let remote = remotes.get_mut(url).unwrap();
        remote.files.insert(path.to_string(), content.to_string());
        remote.revision += 1;
    }

    /// Serve a new repository at `url`.
    fn publish(&self, url: &str, files: &[(&str, &str)]) {
        let files = files
            .iter()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect();
        self.remotes
            .lock()
            .unwrap()
            .insert(url.to_string(), Remote { revision: 1, files });
    }

    /// Add a scheme family to the scheme registry.
    fn register_scheme(&self, name: &str, url: &str) {
        let list = self.remotes.lock().unwrap()[SCHEMES].files["list.yaml"].clone();
        self.commit(SCHEMES, "list.yaml", &format!("{list}{name}: {url}\n"));
    }

    fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    fn clones(&self) -> usize {
        self.clones.load(Ordering::SeqCst)
    }

    fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    fn check(&self, url: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(url) {
            return Err(BuilderError::Sync {
                url: url.to_string(),
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }

    fn checkout(&self, url: &str, dest: &Path) -> Result<()> {
        let remotes = self.remotes.lock().unwrap();
        let Some(remote) = remotes.get(url) else {
            return Err(BuilderError::Sync {
                url: url.to_string(),
                reason: "repository not found".into(),
            });
        };
        std::fs::create_dir_all(dest.join(".git")).unwrap();
        std::fs::write(dest.join(".git/REVISION"), remote.revision.to_string()).unwrap();
        for (path, content) in &remote.files {
            let target = dest.join(path);
            std::fs::create_dir_all(target.parent().unwrap()).unwrap();
            std::fs::write(target, content).unwrap();
        }
        Ok(())
    }
}

impl RepoSync for FakeRemotes {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        self.clones.fetch_add(1, Ordering::SeqCst);
        self.check(url)?;
        self.checkout(url, dest)
    }

    fn pull(&self, url: &str, dest: &Path) -> Result<bool> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.check(url)?;
        let local = std::fs::read_to_string(dest.join(".git/REVISION")).unwrap();
        let upstream = self.remotes.lock().unwrap()[url].revision.to_string();
        if local == upstream {
            return Ok(false);
        }
        self.checkout(url, dest)?;
        Ok(true)
    }
}

fn settings(cache: &Path) -> Settings {
    Settings {
        cache_root: cache.join("base16-builder"),
        schemes_source: SCHEMES.to_string(),
        templates_source: TEMPLATES.to_string(),
        jobs: 4,
    }
}

fn run(fake: &Arc<FakeRemotes>, cache: &Path, request: &BuildRequest) -> Invocation {
    invoke(
        request,
        &settings(cache),
        fake.clone(),
        &CancellationToken::new(),
    )
}

fn request(scheme: Option<&str>, template: Option<&str>) -> BuildRequest {
    BuildRequest {
        scheme: scheme.map(String::from),
        template: template.map(String::from),
        ..BuildRequest::default()
    }
}

#[test]
fn test_single_pair_renders_expected_file() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();

    let result = run(
        &fake,
        cache.path(),
        &request(Some("tomorrow"), Some("shell")),
    );

    assert!(!result.failed, "{:?}", result.message);
    assert!(result.changed);
    assert!(result.errors.is_empty());
    assert_eq!(result.schemes.pair_count(), 2);

    let content = &result.schemes["tomorrow-night"]["shell"]["base16-tomorrow-night.sh"];
    assert!(content.contains("color_background=\"1d1f21\""));
    assert!(content.contains("color00=\"1d/1f/21\""));
    assert!(content.contains("# Base16 Tomorrow Night - Shell color setup script"));
}

#[test]
fn test_family_renders_every_scheme_file() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();

    let result = run(&fake, cache.path(), &request(Some("tomorrow"), Some("vim")));

    assert!(!result.failed);
    assert_eq!(
        result.schemes.schemes().collect::<Vec<_>>(),
        ["tomorrow", "tomorrow-night"]
    );
    let day = &result.schemes["tomorrow"]["vim"]["colors/base16-tomorrow.vim"];
    assert!(day.contains("guibg=#ffffff"));
    assert!(day.contains("let g:colors_name = \"base16-tomorrow\""));
    let night = &result.schemes["tomorrow-night"]["vim"]["colors/base16-tomorrow-night.vim"];
    assert!(night.contains("guibg=#1d1f21"));
    assert!(night.contains("let g:colors_name = \"base16-tomorrow-night\""));
}

#[test]
fn test_family_with_spaced_and_broken_files() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();
    let atelier = "https://example.test/atelier-scheme";
    fake.publish(
        atelier,
        &[
            ("atelier-cave.yaml", "scheme: \"Atelier Cave\"\nbase00: \"19171c\"\n"),
            ("Atelier Dune.yml", "scheme: \"Atelier Dune\"\nbase00: \"20201d\"\n"),
            ("atelier-forest.yaml", "scheme: [unclosed\n"),
            ("README.md", "# Atelier\n"),
        ],
    );
    fake.register_scheme("atelier", atelier);

    let result = run(&fake, cache.path(), &request(Some("atelier"), Some("shell")));

    assert!(!result.failed);
    assert_eq!(
        result.schemes.schemes().collect::<Vec<_>>(),
        ["atelier-cave", "atelier-dune"]
    );
    assert!(result.schemes["atelier-dune"]["shell"]["base16-atelier-dune.sh"]
        .contains("color_background=\"20201d\""));
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("scheme atelier-forest:"));
}

#[test]
fn test_scheme_name_provided_by_two_families_keeps_the_first() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();
    let night = "https://example.test/night-scheme";
    fake.publish(
        night,
        &[("tomorrow-night.yaml", "scheme: \"Night\"\nbase00: \"000000\"\n")],
    );
    fake.register_scheme("night", night);

    let result = run(&fake, cache.path(), &request(None, Some("shell")));

    assert!(!result.failed);
    assert_eq!(result.schemes.pair_count(), 3);
    // families load in name order, so "night" claims the slug first
    assert!(result.schemes["tomorrow-night"]["shell"]["base16-tomorrow-night.sh"]
        .contains("color_background=\"000000\""));
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("also provided by scheme family 'night'"));
}

#[test]
fn test_missing_variable_renders_empty_with_warning() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();

    let result = run(&fake, cache.path(), &request(Some("ocean"), Some("vim")));

    assert!(!result.failed);
    let content = &result.schemes["ocean"]["vim"]["colors/base16-ocean.vim"];
    assert!(content.contains("hi Special guifg=#\n"));
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("base0F-hex"));
}

#[test]
fn test_full_build_covers_every_selected_pair() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();

    let outcome = build(
        &BuildRequest::default(),
        &settings(cache.path()),
        fake.clone(),
        &CancellationToken::new(),
    )
    .unwrap();

    // 2 families x 3 templates
    assert_eq!(outcome.selection.pair_count(), 6);
    // 3 schemes x 2 working templates
    assert_eq!(outcome.results.pair_count(), 6);
    assert_eq!(outcome.missing_pairs().len(), 3);
    for (scheme, template) in outcome.missing_pairs() {
        assert_eq!(template, "broken");
        assert!(
            outcome.errors.iter().any(|e| e.affects(scheme, template)),
            "no error explains {scheme}/{template}"
        );
    }
    // 2 registries, 2 scheme families, 3 templates
    assert_eq!(fake.clones(), 7);
}

#[test]
fn test_one_failing_template_does_not_fail_the_run() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();

    let result = run(&fake, cache.path(), &request(Some("ocean"), None));

    assert!(!result.failed);
    assert!(result.message.is_none());
    let templates: Vec<_> = result.schemes["ocean"].keys().cloned().collect();
    assert_eq!(templates, ["shell", "vim"]);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("template broken:"));
}

#[test]
fn test_scheme_sync_failure_only_drops_that_scheme() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();
    fake.fail("https://example.test/ocean-scheme");

    let result = run(&fake, cache.path(), &request(None, Some("shell")));

    assert!(!result.failed);
    assert_eq!(
        result.schemes.schemes().collect::<Vec<_>>(),
        ["tomorrow", "tomorrow-night"]
    );
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("scheme ocean"));
    assert!(result.errors[0].contains("connection refused"));
}

#[test]
fn test_all_pairs_failing_fails_the_run() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();

    let result = run(&fake, cache.path(), &request(None, Some("broken")));

    assert!(result.failed);
    assert!(result.schemes.is_empty());
    assert_eq!(
        result.message.as_deref(),
        Some("No scheme/template pair rendered successfully")
    );
}

#[test]
fn test_unknown_scheme_is_fatal_and_syncs_nothing_else() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();

    let result = run(&fake, cache.path(), &request(Some("solarized"), None));

    assert!(result.failed);
    assert!(result.schemes.is_empty());
    assert_eq!(result.message.as_deref(), Some("Unknown scheme 'solarized'"));
    // only the two registries were cloned
    assert_eq!(fake.clones(), 2);
}

#[test]
fn test_unknown_template_is_fatal() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();

    let result = run(&fake, cache.path(), &request(None, Some("emacs")));

    assert!(result.failed);
    assert_eq!(result.message.as_deref(), Some("Unknown template 'emacs'"));
}

#[test]
fn test_unreachable_registry_is_fatal() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();
    fake.fail(TEMPLATES);

    let result = run(&fake, cache.path(), &BuildRequest::default());

    assert!(result.failed);
    let message = result.message.unwrap();
    assert!(message.contains("template registry"), "{message}");
}

#[test]
fn test_malformed_registry_is_fatal() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();
    fake.commit(SCHEMES, "list.yaml", "- ocean\n- tomorrow\n");

    let result = run(&fake, cache.path(), &BuildRequest::default());

    assert!(result.failed);
    assert!(result.message.unwrap().starts_with("Malformed scheme registry"));
}

#[test]
fn test_second_run_is_served_from_cache() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();
    let req = request(None, Some("shell"));

    let first = run(&fake, cache.path(), &req);
    let clones = fake.clones();
    let second = run(&fake, cache.path(), &req);

    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(fake.clones(), clones);
    assert_eq!(fake.pulls(), 0);
    assert_eq!(first.schemes, second.schemes);
}

#[test]
fn test_results_do_not_depend_on_cache_or_workers() {
    let fake = FakeRemotes::from_fixtures();
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();

    let sequential = invoke(
        &BuildRequest::default(),
        &Settings {
            jobs: 1,
            ..settings(a.path())
        },
        fake.clone(),
        &CancellationToken::new(),
    );
    let parallel = invoke(
        &BuildRequest::default(),
        &Settings {
            jobs: 8,
            ..settings(b.path())
        },
        fake.clone(),
        &CancellationToken::new(),
    );

    // errors may quote checkout paths, which differ per cache root
    let scrub = |errors: &[String], root: &Path| -> Vec<String> {
        let root = root.display().to_string();
        errors.iter().map(|e| e.replace(&root, "<cache>")).collect()
    };

    assert_eq!(sequential.schemes, parallel.schemes);
    assert!(!sequential.errors.is_empty());
    assert_eq!(
        scrub(&sequential.errors, a.path()),
        scrub(&parallel.errors, b.path())
    );
    assert_eq!(sequential.warnings, parallel.warnings);
}

#[test]
fn test_sync_only_run_reports_changes_without_rendering() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();
    let sync_only = BuildRequest {
        update: true,
        build: false,
        ..BuildRequest::default()
    };

    let first = run(&fake, cache.path(), &sync_only);
    assert!(!first.failed);
    assert!(first.changed);
    assert!(first.schemes.is_empty());
    assert_eq!(list_cached(&cache.path().join("base16-builder")).unwrap().len(), 7);

    // nothing moved upstream
    let second = run(&fake, cache.path(), &sync_only);
    assert!(!second.changed);
    assert_eq!(fake.pulls(), 7);

    fake.commit(
        "https://example.test/ocean-scheme",
        "ocean.yaml",
        "scheme: \"Ocean\"\nbase00: \"000000\"\n",
    );
    let third = run(&fake, cache.path(), &sync_only);
    assert!(third.changed);
}

#[test]
fn test_update_picks_up_upstream_changes() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();
    let req = request(Some("ocean"), Some("shell"));

    run(&fake, cache.path(), &req);
    fake.commit(
        "https://example.test/ocean-scheme",
        "ocean.yaml",
        "scheme: \"Ocean\"\nbase00: \"000000\"\n",
    );

    // without update the cached copy is used
    let stale = run(&fake, cache.path(), &req);
    assert!(stale.schemes["ocean"]["shell"]["base16-ocean.sh"].contains("2b303b"));

    let fresh = run(
        &fake,
        cache.path(),
        &BuildRequest {
            update: true,
            ..req.clone()
        },
    );
    assert!(fresh.changed);
    assert!(fresh.schemes["ocean"]["shell"]["base16-ocean.sh"].contains("000000"));
}

#[test]
fn test_cancelled_run_renders_nothing() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = invoke(
        &BuildRequest::default(),
        &settings(cache.path()),
        fake.clone(),
        &cancel,
    );

    assert!(result.failed);
    assert!(result.schemes.is_empty());
    assert!(result.errors.iter().any(|e| e.contains("cancelled")));
    assert_eq!(fake.clones(), 2);
}

#[test]
fn test_invocation_json_shape() {
    let cache = tempfile::tempdir().unwrap();
    let fake = FakeRemotes::from_fixtures();

    let result = run(&fake, cache.path(), &request(Some("ocean"), Some("shell")));
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["changed"], true);
    assert_eq!(json["failed"], false);
    assert!(json["schemes"]["ocean"]["shell"]["base16-ocean.sh"]
        .as_str()
        .unwrap()
        .contains("2b303b"));
    assert!(json.get("message").is_none());
}
