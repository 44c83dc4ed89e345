// Plan file loading for the Docker Image Tester
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse plan document {document}: {source}")]
    Parse {
        document: usize,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("suite '{suite}' has no image and its document sets no default image")]
    MissingImage { suite: String },

    #[error("test {test} of suite '{suite}' has a non-positive timeout_s")]
    InvalidTimeout { suite: String, test: usize },

    #[error("suite '{suite}' has an invalid wait_s: {wait_s}")]
    InvalidWait { suite: String, wait_s: f64 },

    #[error("env var '{key}' of suite '{suite}' must be a scalar")]
    InvalidEnv { suite: String, key: String },

    #[error("plan contains no suites")]
    Empty,
}

pub type PlanResult<T> = Result<T, PlanError>;

/// One probe run against a suite's main container
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestSpec {
    /// Human-readable assertion the test verifies
    pub ensures_that: String,
    pub image: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub timeout_s: Option<u64>,
}

impl TestSpec {
    /// Command split into the container's argv, `None` keeps the image default
    pub fn argv(&self) -> Option<Vec<String>> {
        self.command.as_deref().map(split_command)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_s.map(Duration::from_secs)
    }
}

/// A named group of tests sharing one main container
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteSpec {
    pub name: String,
    pub image: String,
    pub env: BTreeMap<String, String>,
    pub ready_message: Option<String>,
    pub wait_s: Option<f64>,
    pub tests: Vec<TestSpec>,
}

impl SuiteSpec {
    /// Environment in the `KEY=value` form the container engine expects
    pub fn env_pairs(&self) -> Vec<String> {
        self.env
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect()
    }

    /// Fixed readiness delay, `None` when unset
    pub fn wait_duration(&self) -> Option<Duration> {
        self.wait_s.and_then(|s| Duration::try_from_secs_f64(s).ok())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanSpec {
    pub suites: Vec<SuiteSpec>,
}

/// Suite as written in the file, before the document default image is applied
#[derive(Debug, Deserialize)]
struct RawSuite {
    name: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    env: BTreeMap<String, Value>,
    #[serde(default)]
    ready_message: Option<String>,
    #[serde(default)]
    wait_s: Option<f64>,
    tests: Vec<TestSpec>,
}

/// Document grouping several suites under a shared default image
#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    image: Option<String>,
    suites: Vec<RawSuite>,
}

/// Load a plan from a YAML file
pub fn load_plan(path: &Path) -> PlanResult<PlanSpec> {
    let content = fs::read_to_string(path).map_err(|source| PlanError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_plan(&content)
}

/// Parse a plan from YAML text.
///
/// Each document is either a single suite or a plan document holding a
/// `suites` list and an optional default `image`. Empty documents are skipped.
/// Suites keep file order across documents.
pub fn parse_plan(content: &str) -> PlanResult<PlanSpec> {
    let mut suites = Vec::new();

    for (idx, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let document_number = idx + 1;
        let parse_err = |source| PlanError::Parse {
            document: document_number,
            source,
        };

        let value = Value::deserialize(document).map_err(parse_err)?;
        if value.is_null() {
            continue;
        }

        if value.get("suites").is_some() {
            let plan: RawPlan = serde_yaml::from_value(value).map_err(parse_err)?;
            for raw in plan.suites {
                suites.push(resolve_suite(raw, plan.image.as_deref())?);
            }
        } else {
            let raw: RawSuite = serde_yaml::from_value(value).map_err(parse_err)?;
            suites.push(resolve_suite(raw, None)?);
        }
    }

    if suites.is_empty() {
        return Err(PlanError::Empty);
    }

    Ok(PlanSpec { suites })
}

fn resolve_suite(raw: RawSuite, default_image: Option<&str>) -> PlanResult<SuiteSpec> {
    let image = match raw.image.or_else(|| default_image.map(str::to_string)) {
        Some(image) => image,
        None => return Err(PlanError::MissingImage { suite: raw.name }),
    };

    if let Some(wait_s) = raw.wait_s {
        // Rejects negative, non-finite and overflowing delays alike
        if Duration::try_from_secs_f64(wait_s).is_err() {
            return Err(PlanError::InvalidWait {
                suite: raw.name,
                wait_s,
            });
        }
    }

    if let Some(pos) = raw.tests.iter().position(|t| t.timeout_s == Some(0)) {
        return Err(PlanError::InvalidTimeout {
            suite: raw.name,
            test: pos + 1,
        });
    }

    let mut env = BTreeMap::new();
    for (key, value) in raw.env {
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
            _ => {
                return Err(PlanError::InvalidEnv {
                    suite: raw.name,
                    key,
                })
            }
        };
        env.insert(key, value);
    }

    Ok(SuiteSpec {
        name: raw.name,
        image,
        env,
        ready_message: raw.ready_message,
        wait_s: raw.wait_s,
        tests: raw.tests,
    })
}

/// Split a command string into words.
///
/// Whitespace separates words; single and double quotes group them. An
/// unterminated quote runs to the end of the string.
pub fn split_command(command: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in command.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if in_word {
        words.push(current);
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SMOKE: &str = r#"
name: smoke
image: busybox
env:
  PORT: 8080
  MODE: test
ready_message: ready
tests:
  - ensures_that: true exits zero
    image: busybox
    command: "true"
  - ensures_that: false exits non-zero
    image: busybox
    command: "false"
    timeout_s: 5
"#;

    #[test]
    fn test_parse_single_suite_document() {
        let plan = parse_plan(SMOKE).unwrap();
        assert_eq!(plan.suites.len(), 1);

        let suite = &plan.suites[0];
        assert_eq!(suite.name, "smoke");
        assert_eq!(suite.image, "busybox");
        assert_eq!(suite.ready_message.as_deref(), Some("ready"));
        assert_eq!(suite.env_pairs(), vec!["MODE=test", "PORT=8080"]);
        assert_eq!(suite.tests.len(), 2);
        assert_eq!(suite.tests[0].argv(), Some(vec!["true".to_string()]));
        assert_eq!(suite.tests[0].timeout(), None);
        assert_eq!(suite.tests[1].timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_parse_multiple_documents_keeps_order() {
        let content = r#"
name: first
image: nginx
wait_s: 2
tests: []
---
name: second
image: redis
tests: []
---
"#;
        let plan = parse_plan(content).unwrap();
        let names: Vec<_> = plan.suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(plan.suites[0].wait_duration(), Some(Duration::from_secs(2)));
        assert_eq!(plan.suites[1].wait_duration(), None);
    }

    #[test]
    fn test_plan_document_default_image() {
        let content = r#"
image: my/app:1.0
suites:
  - name: inherits
    tests: []
  - name: overrides
    image: other
    tests: []
"#;
        let plan = parse_plan(content).unwrap();
        assert_eq!(plan.suites[0].image, "my/app:1.0");
        assert_eq!(plan.suites[1].image, "other");
    }

    #[test]
    fn test_missing_image_rejected() {
        let err = parse_plan("name: lonely\ntests: []\n").unwrap_err();
        assert!(matches!(err, PlanError::MissingImage { ref suite } if suite == "lonely"));
    }

    #[test]
    fn test_missing_tests_rejected() {
        let err = parse_plan("name: x\nimage: busybox\n").unwrap_err();
        assert!(matches!(err, PlanError::Parse { document: 1, .. }));
    }

    #[test]
    fn test_missing_ensures_that_rejected() {
        let content = "name: x\nimage: busybox\ntests:\n  - image: busybox\n";
        assert!(matches!(parse_plan(content), Err(PlanError::Parse { .. })));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let content = r#"
name: x
image: busybox
tests:
  - ensures_that: ok
    image: busybox
  - ensures_that: bad
    image: busybox
    timeout_s: 0
"#;
        let err = parse_plan(content).unwrap_err();
        assert!(matches!(err, PlanError::InvalidTimeout { test: 2, .. }));
    }

    #[test]
    fn test_negative_wait_rejected() {
        let content = "name: x\nimage: busybox\nwait_s: -1\ntests: []\n";
        assert!(matches!(parse_plan(content), Err(PlanError::InvalidWait { .. })));
    }

    #[test]
    fn test_wait_too_large_for_a_duration_rejected() {
        let content = "name: x\nimage: busybox\nwait_s: 1e30\ntests: []\n";
        let err = parse_plan(content).unwrap_err();
        assert!(matches!(err, PlanError::InvalidWait { wait_s, .. } if wait_s == 1e30));
    }

    #[test]
    fn test_fractional_wait() {
        let content = "name: x\nimage: busybox\nwait_s: 0.5\ntests: []\n";
        let plan = parse_plan(content).unwrap();
        assert_eq!(plan.suites[0].wait_duration(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_nested_env_rejected() {
        let content = "name: x\nimage: busybox\nenv:\n  A:\n    - 1\ntests: []\n";
        assert!(matches!(parse_plan(content), Err(PlanError::InvalidEnv { .. })));
    }

    #[test]
    fn test_empty_plan_rejected() {
        assert!(matches!(parse_plan(""), Err(PlanError::Empty)));
        assert!(matches!(parse_plan("---\n---\n"), Err(PlanError::Empty)));
    }

    #[test]
    fn test_load_plan_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SMOKE.as_bytes()).unwrap();

        let plan = load_plan(file.path()).unwrap();
        assert_eq!(plan.suites[0].name, "smoke");
    }

    #[test]
    fn test_bundled_sample_plan_parses() {
        let plan = parse_plan(include_str!("../../../dit.yml")).unwrap();
        assert_eq!(plan.suites.len(), 2);
        assert_eq!(
            plan.suites[0].env_pairs(),
            vec!["NGINX_ENTRYPOINT_QUIET_LOGS=1"]
        );
        assert_eq!(
            plan.suites[0].tests[1].argv(),
            Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                "! wget -q -O- http://main/missing".to_string()
            ])
        );
        assert_eq!(plan.suites[1].wait_duration(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_plan(Path::new("/definitely/not/here/dit.yml")).unwrap_err();
        assert!(matches!(err, PlanError::Read { .. }));
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("true"), vec!["true"]);
        assert_eq!(
            split_command("  sh -c 'wget -q -O- http://main:80/' "),
            vec!["sh", "-c", "wget -q -O- http://main:80/"]
        );
        assert_eq!(split_command(r#"echo "a b" c"#), vec!["echo", "a b", "c"]);
        assert_eq!(split_command(r#"printf ''"#), vec!["printf", ""]);
        assert!(split_command("   ").is_empty());
    }
}
