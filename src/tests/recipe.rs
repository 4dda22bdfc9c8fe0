//! Recipe script runner
//!
//! Every recipe directory ships `setup.sh`, `run-test.sh` and `cleanup.sh`.
//! The scripts run with bash, in that order, from the recipes checkout.

use anyhow::{Context, Result};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::TestResult;
use crate::utils::{run_in_dir, Timer};

/// Directories scanned for recipes, relative to the recipes checkout
pub const DEFAULT_RECIPE_ROOTS: [&str; 2] = ["ingress/single-cluster/", "authz/"];

/// Scripts run for each recipe, in order
pub const RECIPE_SCRIPTS: [&str; 3] = ["setup.sh", "run-test.sh", "cleanup.sh"];

/// Recipes under roots containing this may omit scripts
const OPTIONAL_SCRIPTS_MARKER: &str = "authz";

/// What to do with one recipe directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecipePlan {
    /// Scripts to run, relative to the recipes checkout
    Run(Vec<PathBuf>),
    Skip(String),
}

/// Decide which scripts of `recipe` (relative to `base_dir`) to run
pub fn plan_recipe(base_dir: &Path, recipe: &Path) -> RecipePlan {
    let dir = base_dir.join(recipe);
    if !dir.is_dir() {
        return RecipePlan::Skip(format!("{} is not a directory", recipe.display()));
    }

    let optional = recipe.to_string_lossy().contains(OPTIONAL_SCRIPTS_MARKER);
    let mut scripts = Vec::new();

    for script in RECIPE_SCRIPTS {
        if dir.join(script).is_file() {
            scripts.push(recipe.join(script));
        } else if !optional {
            return RecipePlan::Skip(format!("missing {script} in {}", recipe.display()));
        }
    }

    RecipePlan::Run(scripts)
}

/// Runs the scripts of every recipe under the configured roots
#[derive(Clone, Debug)]
pub struct RecipeTestSuite {
    base_dir: PathBuf,
    roots: Vec<String>,
    stagger: Duration,
    shell: String,
}

impl RecipeTestSuite {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            roots: DEFAULT_RECIPE_ROOTS.iter().map(|r| r.to_string()).collect(),
            stagger: Duration::from_secs(30),
            shell: "bash".to_string(),
        }
    }

    pub fn roots(mut self, roots: Vec<String>) -> Self {
        self.roots = roots;
        self
    }

    /// Delay between the start of consecutive recipes under a root
    pub fn stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Entries of `root`, sorted by name, relative to the recipes checkout
    pub fn list_recipes(&self, root: &str) -> Result<Vec<PathBuf>> {
        let dir = self.base_dir.join(root);
        let mut names = std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to read recipe root {}", dir.display()))?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect::<std::io::Result<Vec<_>>>()
            .with_context(|| format!("Failed to list {}", dir.display()))?;
        names.sort();

        Ok(names.into_iter().map(|name| Path::new(root).join(name)).collect())
    }

    /// Run every recipe concurrently. Within a root, recipe `i` starts
    /// `i * stagger` after launch.
    pub async fn run_all(&self) -> Vec<TestResult> {
        info!(
            "Running recipes under {:?} in {}",
            self.roots,
            self.base_dir.display()
        );

        let mut runs = Vec::new();
        let mut results = Vec::new();

        for root in &self.roots {
            let recipes = match self.list_recipes(root) {
                Ok(recipes) => recipes,
                Err(e) => {
                    results.push(TestResult::error(root.as_str(), format!("{e:#}")));
                    continue;
                }
            };

            for (i, recipe) in recipes.into_iter().enumerate() {
                let delay = self.stagger * i as u32;
                runs.push(async move {
                    tokio::time::sleep(delay).await;
                    self.run_recipe(&recipe).await
                });
            }
        }

        results.extend(join_all(runs).await);
        results
    }

    /// Run the scripts of one recipe, stopping at the first failure
    pub async fn run_recipe(&self, recipe: &Path) -> TestResult {
        let name = recipe.display().to_string();
        let scripts = match plan_recipe(&self.base_dir, recipe) {
            RecipePlan::Run(scripts) => scripts,
            RecipePlan::Skip(reason) => {
                debug!("Skipping {}: {}", name, reason);
                return TestResult::skip(name, reason);
            }
        };

        let timer = Timer::start(&name);
        for script in &scripts {
            info!("Running {} {}", self.shell, script.display());
            let output = match run_in_dir(&self.shell, [script], &self.base_dir).await {
                Ok(output) => output,
                Err(e) => {
                    return TestResult::fail(
                        name.as_str(),
                        timer.stop(),
                        format!("Test {name} failed when running {}: {e:#}", script.display()),
                    );
                }
            };

            if !output.success() {
                warn!("{} exited with {}", script.display(), output.exit_code);
                return TestResult::fail(
                    name.as_str(),
                    timer.stop(),
                    format!(
                        "Test {name} failed when running {}: {}",
                        script.display(),
                        output.combined().trim()
                    ),
                );
            }
        }

        TestResult::pass(name, timer.stop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestStatus;
    use std::fs;
    use tempfile::TempDir;

    fn write_recipe(base: &Path, recipe: &str, scripts: &[(&str, &str)]) {
        let dir = base.join(recipe);
        fs::create_dir_all(&dir).unwrap();
        for (name, body) in scripts {
            fs::write(dir.join(name), body).unwrap();
        }
    }

    fn all_scripts(body: &str) -> Vec<(&'static str, String)> {
        RECIPE_SCRIPTS.iter().map(|s| (*s, body.to_string())).collect()
    }

    fn suite(base: &TempDir) -> RecipeTestSuite {
        RecipeTestSuite::new(base.path()).stagger(Duration::ZERO)
    }

    #[test]
    fn test_plan_complete_recipe() {
        let base = TempDir::new().unwrap();
        let scripts = all_scripts("exit 0\n");
        let scripts: Vec<_> = scripts.iter().map(|(n, b)| (*n, b.as_str())).collect();
        write_recipe(base.path(), "ingress/single-cluster/ingress-basic", &scripts);

        let recipe = Path::new("ingress/single-cluster/ingress-basic");
        assert_eq!(
            plan_recipe(base.path(), recipe),
            RecipePlan::Run(vec![
                recipe.join("setup.sh"),
                recipe.join("run-test.sh"),
                recipe.join("cleanup.sh"),
            ])
        );
    }

    #[test]
    fn test_plan_missing_script_skips() {
        let base = TempDir::new().unwrap();
        write_recipe(
            base.path(),
            "ingress/single-cluster/ingress-https",
            &[("setup.sh", "exit 0\n"), ("cleanup.sh", "exit 0\n")],
        );

        match plan_recipe(base.path(), Path::new("ingress/single-cluster/ingress-https")) {
            RecipePlan::Skip(reason) => assert!(reason.contains("run-test.sh")),
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_authz_runs_present_scripts() {
        let base = TempDir::new().unwrap();
        write_recipe(base.path(), "authz/iap", &[("run-test.sh", "exit 0\n")]);

        assert_eq!(
            plan_recipe(base.path(), Path::new("authz/iap")),
            RecipePlan::Run(vec![PathBuf::from("authz/iap/run-test.sh")])
        );
    }

    #[test]
    fn test_plan_non_directory_skips() {
        let base = TempDir::new().unwrap();
        fs::create_dir_all(base.path().join("authz")).unwrap();
        fs::write(base.path().join("authz/README.md"), "# authz\n").unwrap();

        assert!(matches!(
            plan_recipe(base.path(), Path::new("authz/README.md")),
            RecipePlan::Skip(_)
        ));
    }

    #[test]
    fn test_list_recipes_sorted() {
        let base = TempDir::new().unwrap();
        for name in ["ingress-https", "ingress-basic", "ingress-iap"] {
            fs::create_dir_all(base.path().join("ingress/single-cluster").join(name)).unwrap();
        }

        let recipes = suite(&base).list_recipes("ingress/single-cluster/").unwrap();
        assert_eq!(
            recipes,
            vec![
                PathBuf::from("ingress/single-cluster/ingress-basic"),
                PathBuf::from("ingress/single-cluster/ingress-https"),
                PathBuf::from("ingress/single-cluster/ingress-iap"),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_recipe_passes() {
        let base = TempDir::new().unwrap();
        write_recipe(
            base.path(),
            "ingress/single-cluster/ingress-basic",
            &[
                ("setup.sh", "echo setup >> log.txt\n"),
                ("run-test.sh", "echo run >> log.txt\n"),
                ("cleanup.sh", "echo cleanup >> log.txt\n"),
            ],
        );

        let result = suite(&base)
            .run_recipe(Path::new("ingress/single-cluster/ingress-basic"))
            .await;
        assert_eq!(result.status, TestStatus::Pass, "{:?}", result.message);

        // Scripts run from the checkout root, in order
        let log = fs::read_to_string(base.path().join("log.txt")).unwrap();
        assert_eq!(log, "setup\nrun\ncleanup\n");
    }

    #[tokio::test]
    async fn test_run_recipe_stops_at_first_failure() {
        let base = TempDir::new().unwrap();
        write_recipe(
            base.path(),
            "ingress/single-cluster/ingress-broken",
            &[
                ("setup.sh", "echo setup >> log.txt\n"),
                ("run-test.sh", "echo 'no ingress IP'\nexit 3\n"),
                ("cleanup.sh", "echo cleanup >> log.txt\n"),
            ],
        );

        let result = suite(&base)
            .run_recipe(Path::new("ingress/single-cluster/ingress-broken"))
            .await;
        assert_eq!(result.status, TestStatus::Fail);
        let message = result.message.unwrap();
        assert!(message.starts_with("Test ingress/single-cluster/ingress-broken failed when running"));
        assert!(message.contains("no ingress IP"));

        let log = fs::read_to_string(base.path().join("log.txt")).unwrap();
        assert_eq!(log, "setup\n");
    }

    #[tokio::test]
    async fn test_run_all_mixes_roots() {
        let base = TempDir::new().unwrap();
        let ok = all_scripts("exit 0\n");
        let ok: Vec<_> = ok.iter().map(|(n, b)| (*n, b.as_str())).collect();
        write_recipe(base.path(), "ingress/single-cluster/ingress-basic", &ok);
        write_recipe(base.path(), "ingress/single-cluster/ingress-partial", &[("setup.sh", "exit 0\n")]);
        write_recipe(base.path(), "authz/iap", &[("run-test.sh", "exit 0\n")]);

        let results = suite(&base).run_all().await;
        let status = |name: &str| {
            results
                .iter()
                .find(|r| r.name == name)
                .map(|r| r.status)
                .unwrap()
        };

        assert_eq!(results.len(), 3);
        assert_eq!(status("ingress/single-cluster/ingress-basic"), TestStatus::Pass);
        assert_eq!(status("ingress/single-cluster/ingress-partial"), TestStatus::Skip);
        assert_eq!(status("authz/iap"), TestStatus::Pass);
    }

    #[tokio::test]
    async fn test_run_all_missing_root() {
        let base = TempDir::new().unwrap();
        let results = suite(&base).roots(vec!["missing/".to_string()]).run_all().await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, TestStatus::Error);
    }
}
